//! Entity use-case service.
//!
//! # Responsibility
//! - Single entry point for shell callers: add, edit, remove, find, list.
//! - Pick the search strategy from the capability snapshot taken at startup.
//! - Rank results through the injected [`Matcher`].
//!
//! # Invariants
//! - No entity state is cached between calls; every call reads storage.
//! - Repository errors (`NotFound` in particular) propagate unchanged.
//! - Without full-text support, `find` never returns an entity missing a
//!   query token unless typo tolerance is active.

use crate::db::Capabilities;
use crate::matcher::{matcher_for, Matcher, MatcherKind};
use crate::model::entity::{Attributes, Entity, EntityChanges, EntityId, NewEntity};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use log::debug;

/// Minimum fuzzy score for typo-tolerant matches.
pub const FUZZY_RELEVANCE_THRESHOLD: f64 = 50.0;

/// One `find` result. `score` is the matcher score used for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entity: Entity,
    pub score: f64,
}

/// Facade over storage and matching.
pub struct EntityService<R: EntityRepository> {
    repo: R,
    capabilities: Capabilities,
    matcher: Box<dyn Matcher>,
}

impl<R: EntityRepository> EntityService<R> {
    /// Creates a service with an explicit capability snapshot and strategy.
    ///
    /// Passing reduced capabilities forces degraded search paths.
    pub fn new(repo: R, capabilities: Capabilities, matcher_kind: MatcherKind) -> Self {
        let matcher = matcher_for(matcher_kind);
        debug!(
            "event=service_init module=service fulltext={} structured_query={} matcher={}",
            capabilities.has_fulltext,
            capabilities.has_structured_query,
            matcher.kind().as_str()
        );
        Self {
            repo,
            capabilities,
            matcher,
        }
    }

    /// Creates a service using the repository's probed capabilities and the
    /// best compiled-in matcher.
    pub fn with_detected(repo: R) -> Self {
        let capabilities = repo.capabilities();
        Self::new(repo, capabilities, MatcherKind::detect())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn matcher_kind(&self) -> MatcherKind {
        self.matcher.kind()
    }

    /// Records a new entity and returns it as persisted.
    pub fn add(
        &self,
        category: impl Into<String>,
        name: impl Into<String>,
        notes: impl Into<String>,
        attributes: Attributes,
    ) -> RepoResult<Entity> {
        let entity = NewEntity::new(category, name)
            .with_notes(notes)
            .with_attributes(attributes);
        self.create(&entity)
    }

    /// Full-form `add`, including tags.
    pub fn create(&self, entity: &NewEntity) -> RepoResult<Entity> {
        entity.validate()?;
        let id = self.repo.insert_entity(entity)?;
        self.repo.get_entity(id)
    }

    /// Applies partial changes and returns the refreshed entity.
    pub fn edit(&self, id: EntityId, changes: &EntityChanges) -> RepoResult<Entity> {
        self.repo.update_entity(id, changes)?;
        self.repo.get_entity(id)
    }

    pub fn remove(&self, id: EntityId) -> RepoResult<()> {
        self.repo.delete_entity(id)
    }

    pub fn get(&self, id: EntityId) -> RepoResult<Entity> {
        self.repo.get_entity(id)
    }

    /// Every entity in insertion order.
    pub fn all(&self) -> RepoResult<Vec<Entity>> {
        self.repo.list_entities()
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.repo.count_entities()
    }

    pub fn find_by_attribute(&self, key: &str, value: &str) -> RepoResult<Vec<Entity>> {
        self.repo.find_by_attribute(key.trim(), value)
    }

    /// Ranked search.
    ///
    /// # Contract
    /// - Blank query: every entity, insertion order, score 0.
    /// - Full-text: engine relevance order.
    /// - Otherwise: entities containing every token, by descending score.
    /// - Nothing found and fuzzy matcher active: entities scoring at least
    ///   [`FUZZY_RELEVANCE_THRESHOLD`].
    pub fn find(&self, query: &str) -> RepoResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(self
                .repo
                .list_entities()?
                .into_iter()
                .map(|entity| SearchHit { entity, score: 0.0 })
                .collect());
        }

        let (strategy, hits) = if self.capabilities.has_fulltext {
            let hits = self
                .repo
                .search_text(query)?
                .into_iter()
                .map(|entity| {
                    let score = self.matcher.score(query, &entity.match_text());
                    SearchHit { entity, score }
                })
                .collect::<Vec<_>>();
            ("fulltext", hits)
        } else {
            let candidates = self
                .repo
                .list_entities()?
                .into_iter()
                .filter(|entity| entity.contains_all_tokens(query))
                .collect();
            ("substring", self.rank_entities(query, candidates, None))
        };

        if !hits.is_empty() || self.matcher.kind() != MatcherKind::Fuzzy {
            debug!(
                "event=entity_find module=service strategy={strategy} hits={}",
                hits.len()
            );
            return Ok(hits);
        }

        let hits = self.rank_entities(
            query,
            self.repo.list_entities()?,
            Some(FUZZY_RELEVANCE_THRESHOLD),
        );
        debug!(
            "event=entity_find module=service strategy=fuzzy_fallback hits={}",
            hits.len()
        );
        Ok(hits)
    }

    fn rank_entities(
        &self,
        query: &str,
        entities: Vec<Entity>,
        threshold: Option<f64>,
    ) -> Vec<SearchHit> {
        let texts = entities.iter().map(Entity::match_text).collect::<Vec<_>>();
        let candidates = texts.iter().map(String::as_str).collect::<Vec<_>>();
        let ranked = self.matcher.rank(query, &candidates);

        let mut slots = entities.into_iter().map(Some).collect::<Vec<_>>();
        ranked
            .into_iter()
            .filter(|ranked| threshold.map_or(true, |minimum| ranked.score >= minimum))
            .filter_map(|ranked| {
                slots[ranked.index].take().map(|entity| SearchHit {
                    entity,
                    score: ranked.score,
                })
            })
            .collect()
    }
}
