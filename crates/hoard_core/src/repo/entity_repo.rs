//! Entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, listing and text search over the `entities` table.
//! - Choose FTS5 or substring scanning based on the capability snapshot.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Every mutation runs in its own transaction and commits before returning.
//! - A failed mutation never commits; the dropped transaction rolls back.
//! - Write paths validate before touching SQL.
//! - Read paths reject corrupt persisted rows instead of masking them.

use crate::db::{Capabilities, Database, DbError};
use crate::model::entity::{
    normalize_tags, parse_tag_list, slugify, Attributes, Entity, EntityChanges, EntityId,
    EntityValidationError, NewEntity,
};
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    category,
    name,
    slug,
    notes,
    tags,
    attributes,
    created_at
FROM entities";

const FULLTEXT_SELECT_SQL: &str = "SELECT
    e.id AS id,
    e.category AS category,
    e.name AS name,
    e.slug AS slug,
    e.notes AS notes,
    e.tags AS tags,
    e.attributes AS attributes,
    e.created_at AS created_at
FROM entities_fts
JOIN entities e ON e.id = entities_fts.rowid
WHERE entities_fts MATCH ?1
ORDER BY bm25(entities_fts), e.id ASC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Required field missing or blank; nothing was written.
    Validation(EntityValidationError),
    /// Engine or disk failure; the current operation was aborted.
    Db(DbError),
    /// Referenced identifier does not exist.
    NotFound(EntityId),
    /// Persisted row cannot be decoded.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "storage error: {err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for entities.
pub trait EntityRepository {
    /// Engine features this repository was opened with.
    fn capabilities(&self) -> Capabilities;
    fn insert_entity(&self, entity: &NewEntity) -> RepoResult<EntityId>;
    fn get_entity(&self, id: EntityId) -> RepoResult<Entity>;
    /// Applies partial changes. `id`, `created_at` and `slug` are not editable.
    fn update_entity(&self, id: EntityId, changes: &EntityChanges) -> RepoResult<()>;
    fn delete_entity(&self, id: EntityId) -> RepoResult<()>;
    /// All entities in identifier (insertion) order.
    fn list_entities(&self) -> RepoResult<Vec<Entity>>;
    /// Entities containing every query token. Relevance-ranked with FTS,
    /// identifier order otherwise. Tokens with punctuation always take the
    /// substring scan. Blank queries return nothing.
    fn search_text(&self, query: &str) -> RepoResult<Vec<Entity>>;
    /// Entities whose string attribute `key` equals `value`.
    fn find_by_attribute(&self, key: &str, value: &str) -> RepoResult<Vec<Entity>>;
    fn count_entities(&self) -> RepoResult<u64>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
    capabilities: Capabilities,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Borrows the connection and capability snapshot of an open database.
    pub fn new(db: &'conn Database) -> Self {
        Self {
            conn: db.conn(),
            capabilities: db.capabilities(),
        }
    }

    /// Builds a repository over a connection whose schema is already bootstrapped.
    pub fn with_connection(conn: &'conn Connection, capabilities: Capabilities) -> Self {
        Self { conn, capabilities }
    }

    fn attributes_param(&self) -> &'static str {
        if self.capabilities.has_structured_query {
            "json(?6)"
        } else {
            "?6"
        }
    }

    fn search_fulltext(&self, tokens: &[&str]) -> RepoResult<Vec<Entity>> {
        let match_expr = build_match_expression(tokens);
        let mut stmt = self.conn.prepare(FULLTEXT_SELECT_SQL)?;
        let mut rows = stmt.query([match_expr.as_str()])?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    fn search_substring(&self, query: &str) -> RepoResult<Vec<Entity>> {
        Ok(self
            .list_entities()?
            .into_iter()
            .filter(|entity| entity.contains_all_tokens(query))
            .collect())
    }

    fn query_entities(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn insert_entity(&self, entity: &NewEntity) -> RepoResult<EntityId> {
        entity.validate()?;
        let started_at = Instant::now();
        let attributes = encode_attributes(&entity.attributes)?;
        let tags = normalize_tags(&entity.tags).join(",");

        let tx = self.conn.unchecked_transaction()?;
        let created_at = next_created_at(&tx)?;
        tx.execute(
            &format!(
                "INSERT INTO entities (category, name, slug, notes, tags, attributes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, {}, ?7);",
                self.attributes_param()
            ),
            params![
                entity.category.as_str(),
                entity.name.as_str(),
                slugify(&entity.name),
                entity.notes.as_str(),
                tags,
                attributes,
                created_at,
            ],
        )?;
        let id = EntityId(tx.last_insert_rowid());
        tx.commit()?;

        info!(
            "event=entity_insert module=repo status=ok id={} duration_ms={}",
            id,
            started_at.elapsed().as_millis()
        );
        Ok(id)
    }

    fn get_entity(&self, id: EntityId) -> RepoResult<Entity> {
        load_entity(self.conn, id)?.ok_or(RepoError::NotFound(id))
    }

    fn update_entity(&self, id: EntityId, changes: &EntityChanges) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = self.conn.unchecked_transaction()?;
        let mut entity = load_entity(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        changes.apply_to(&mut entity);
        entity.validate()?;
        let attributes = encode_attributes(&entity.attributes)?;

        tx.execute(
            &format!(
                "UPDATE entities
                 SET
                    category = ?1,
                    name = ?2,
                    slug = ?3,
                    notes = ?4,
                    tags = ?5,
                    attributes = {}
                 WHERE id = ?7;",
                self.attributes_param()
            ),
            params![
                entity.category.as_str(),
                entity.name.as_str(),
                entity.slug.as_str(),
                entity.notes.as_str(),
                entity.tags.join(","),
                attributes,
                id.get(),
            ],
        )?;
        tx.commit()?;

        info!(
            "event=entity_update module=repo status=ok id={} duration_ms={}",
            id,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn delete_entity(&self, id: EntityId) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute("DELETE FROM entities WHERE id = ?1;", [id.get()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.commit()?;

        info!(
            "event=entity_delete module=repo status=ok id={} duration_ms={}",
            id,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn list_entities(&self) -> RepoResult<Vec<Entity>> {
        self.query_entities(&format!("{ENTITY_SELECT_SQL} ORDER BY id ASC;"), [])
    }

    fn search_text(&self, query: &str) -> RepoResult<Vec<Entity>> {
        let tokens = query.split_whitespace().collect::<Vec<_>>();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        // The FTS tokenizer drops punctuation, so `c++` would match as `c*`.
        let indexable = tokens.iter().all(|token| is_indexable_token(token));
        if self.capabilities.has_fulltext && !indexable {
            debug!("event=search_text module=repo status=bypass strategy=fts5 reason=punctuation");
        }
        if self.capabilities.has_fulltext && indexable {
            match self.search_fulltext(&tokens) {
                Ok(entities) => {
                    debug!(
                        "event=search_text module=repo strategy=fts5 hits={}",
                        entities.len()
                    );
                    return Ok(entities);
                }
                Err(RepoError::Db(DbError::Sqlite(err))) if is_match_syntax_error(&err) => {
                    warn!(
                        "event=search_text module=repo status=degraded strategy=fts5 error={err}"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let entities = self.search_substring(query)?;
        debug!(
            "event=search_text module=repo strategy=substring hits={}",
            entities.len()
        );
        Ok(entities)
    }

    fn find_by_attribute(&self, key: &str, value: &str) -> RepoResult<Vec<Entity>> {
        if self.capabilities.has_structured_query && !key.contains('"') {
            let path = format!("$.\"{key}\"");
            return self.query_entities(
                &format!(
                    "{ENTITY_SELECT_SQL}
                     WHERE json_type(attributes, ?1) = 'text'
                       AND json_extract(attributes, ?1) = ?2
                     ORDER BY id ASC;"
                ),
                params![path, value],
            );
        }

        Ok(self
            .list_entities()?
            .into_iter()
            .filter(|entity| {
                matches!(entity.attributes.get(key), Some(serde_json::Value::String(text)) if text == value)
            })
            .collect())
    }

    fn count_entities(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }
}

fn load_entity(conn: &Connection, id: EntityId) -> RepoResult<Option<Entity>> {
    let mut stmt = conn.prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.get()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entity_row(row)?));
    }
    Ok(None)
}

/// Creation time that never goes backwards relative to existing rows.
fn next_created_at(conn: &Connection) -> RepoResult<i64> {
    let now = Utc::now().timestamp_millis();
    let latest: Option<i64> =
        conn.query_row("SELECT MAX(created_at) FROM entities;", [], |row| row.get(0))?;
    Ok(latest.map_or(now, |latest| latest.max(now)))
}

fn encode_attributes(attributes: &Attributes) -> RepoResult<String> {
    serde_json::to_string(attributes)
        .map_err(|err| RepoError::InvalidData(format!("attributes cannot be serialized: {err}")))
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<Entity> {
    let id = EntityId(row.get("id")?);
    let attributes_text: String = row.get("attributes")?;
    let attributes = serde_json::from_str::<Attributes>(&attributes_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid attributes `{attributes_text}` in entities.attributes for id {id}: {err}"
        ))
    })?;
    let tags_text: String = row.get("tags")?;

    let entity = Entity {
        id,
        category: row.get("category")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        notes: row.get("notes")?,
        tags: parse_tag_list(&tags_text),
        attributes,
        created_at: row.get("created_at")?,
    };
    entity.validate().map_err(|err| {
        RepoError::InvalidData(format!("entity {id} violates field rules: {err}"))
    })?;
    Ok(entity)
}

/// Quotes every token as an FTS5 prefix phrase and requires all of them.
fn build_match_expression(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Whether FTS5 indexes `token` exactly as typed.
fn is_indexable_token(token: &str) -> bool {
    token.chars().all(char::is_alphanumeric)
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_match_expression, is_indexable_token};

    #[test]
    fn match_expression_quotes_tokens_as_prefix_phrases() {
        assert_eq!(
            build_match_expression(&["alice", "smi\"th"]),
            "\"alice\"* AND \"smi\"\"th\"*"
        );
    }

    #[test]
    fn punctuated_tokens_are_not_indexable() {
        assert!(is_indexable_token("alice"));
        assert!(is_indexable_token("Émile"));
        assert!(!is_indexable_token("c++"));
        assert!(!is_indexable_token("!!!"));
        assert!(!is_indexable_token("example.com"));
    }
}
