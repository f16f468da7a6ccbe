//! Plain-text formatting for shell output.

use chrono::DateTime;
use hoard_core::{Capabilities, Entity, MatcherKind, SearchHit};
use std::path::Path;

const RULE_WIDTH: usize = 60;

pub const HELP_TEXT: &str = "Commands:
  <text>              search entities
  add | new           record a new entity
  list                list every entity
  view <id>           show one entity
  edit <id>           edit an entity
  delete <id>         delete an entity
  attr <key>=<value>  find entities by attribute
  help                show this help
  quit | exit | :q    leave";

/// One-line summary: `[id] (category) name - first notes line`.
pub fn entity_line(entity: &Entity) -> String {
    let first_line = entity.notes.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        format!("[{}] ({}) {}", entity.id, entity.category, entity.name)
    } else {
        format!(
            "[{}] ({}) {} - {}",
            entity.id, entity.category, entity.name, first_line
        )
    }
}

/// Numbered search results with scores.
pub fn search_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(position, hit)| {
            format!(
                "{}. {} (score={:.2})",
                position + 1,
                entity_line(&hit.entity),
                hit.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full record view.
pub fn entity_detail(entity: &Entity) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let tags = if entity.tags.is_empty() {
        "-".to_string()
    } else {
        entity.tags.join(", ")
    };
    let attributes =
        serde_json::to_string_pretty(&entity.attributes).unwrap_or_else(|_| "{}".to_string());

    format!(
        "{rule}\nID: {}\nCategory: {}\nName: {}\nSlug: {}\nNotes:\n{}\nTags: {}\nAttributes:\n{}\nCreated: {}\n{rule}",
        entity.id,
        entity.category,
        entity.name,
        entity.slug,
        indent(&entity.notes),
        tags,
        indent(&attributes),
        timestamp(entity.created_at),
    )
}

/// Startup banner describing which strategies are active.
pub fn banner(db_path: &Path, count: u64, capabilities: Capabilities, matcher: MatcherKind) -> String {
    let fulltext = if capabilities.has_fulltext {
        "FTS5 search: enabled"
    } else {
        "FTS5 search: not available; using substring fallback"
    };
    let structured = if capabilities.has_structured_query {
        "JSON attribute queries: enabled"
    } else {
        "JSON attribute queries: not available; filtering in process"
    };
    let matching = match matcher {
        MatcherKind::Fuzzy => "Fuzzy matching: nucleo",
        MatcherKind::Heuristic => "Fuzzy matching: built-in heuristic",
    };
    format!(
        "Entity Hoard\nDB: {} ({count} entities)\n{fulltext}\n{structured}\n{matching}\nType `help` for commands.",
        db_path.display()
    )
}

pub fn timestamp(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

fn indent(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "  -".to_string();
    }
    trimmed
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
