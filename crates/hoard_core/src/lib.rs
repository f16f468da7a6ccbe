//! Entity storage and retrieval core for Entity Hoard.
//! This crate owns every persistence and search invariant; the shell only
//! calls [`EntityService`].

pub mod db;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, open_db_with_capabilities, Capabilities, Database, DbError, DbTarget};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use matcher::{matcher_for, HeuristicMatcher, Matcher, MatcherKind, RankedCandidate};
pub use model::entity::{
    Attributes, Entity, EntityChanges, EntityId, EntityValidationError, NewEntity,
};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use service::entity_service::{EntityService, SearchHit, FUZZY_RELEVANCE_THRESHOLD};

#[cfg(feature = "fuzzy")]
pub use matcher::FuzzyMatcher;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
