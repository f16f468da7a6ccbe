use hoard_core::db::{open_db_with_capabilities, DbTarget};
use hoard_core::{
    Attributes, Capabilities, EntityChanges, EntityId, EntityRepository, NewEntity,
    SqliteEntityRepository,
};
use serde_json::json;

fn seed(repo: &SqliteEntityRepository<'_>) -> (EntityId, EntityId) {
    let docs = repo
        .insert_entity(
            &NewEntity::new("website", "Docs")
                .with_attribute("url", "docs.rs")
                .with_attribute("stars", 5),
        )
        .unwrap();
    let crates = repo
        .insert_entity(
            &NewEntity::new("website", "Crates")
                .with_attribute("url", "crates.io")
                .with_attribute("mirror", "docs.rs"),
        )
        .unwrap();
    repo.insert_entity(&NewEntity::new("person", "No attributes"))
        .unwrap();
    (docs, crates)
}

fn ids(entities: Vec<hoard_core::Entity>) -> Vec<EntityId> {
    entities.into_iter().map(|entity| entity.id).collect()
}

#[test]
fn attribute_queries_agree_with_and_without_json1() {
    let structured = Capabilities {
        has_fulltext: false,
        has_structured_query: true,
    };

    for capabilities in [structured, Capabilities::NONE] {
        let db = open_db_with_capabilities(DbTarget::Memory, capabilities).unwrap();
        assert_eq!(db.capabilities(), capabilities);
        let repo = SqliteEntityRepository::new(&db);
        let (docs, crates) = seed(&repo);

        assert_eq!(ids(repo.find_by_attribute("url", "docs.rs").unwrap()), vec![docs]);
        assert_eq!(ids(repo.find_by_attribute("mirror", "docs.rs").unwrap()), vec![crates]);
        assert!(repo.find_by_attribute("url", "DOCS.RS").unwrap().is_empty());
        // Only string values match.
        assert!(repo.find_by_attribute("stars", "5").unwrap().is_empty());
        assert!(repo.find_by_attribute("missing", "x").unwrap().is_empty());
    }
}

#[test]
fn keys_with_quotes_fall_back_to_rust_filtering() {
    let db = open_db_with_capabilities(DbTarget::Memory, Capabilities::ALL).unwrap();
    let repo = SqliteEntityRepository::new(&db);
    let id = repo
        .insert_entity(&NewEntity::new("feature", "Quoted").with_attribute("say \"hi\"", "yes"))
        .unwrap();

    assert_eq!(ids(repo.find_by_attribute("say \"hi\"", "yes").unwrap()), vec![id]);
}

#[test]
fn attributes_roundtrip_nested_values_and_can_be_replaced() {
    let db = open_db_with_capabilities(DbTarget::Memory, Capabilities::ALL).unwrap();
    let repo = SqliteEntityRepository::new(&db);
    let id = repo
        .insert_entity(
            &NewEntity::new("website", "Nested")
                .with_attribute("links", json!({"home": "a.example", "ports": [80, 443]})),
        )
        .unwrap();

    let loaded = repo.get_entity(id).unwrap();
    assert_eq!(loaded.attributes["links"]["ports"], json!([80, 443]));

    let mut replacement = Attributes::new();
    replacement.insert("url".to_string(), json!("b.example"));
    repo.update_entity(
        id,
        &EntityChanges {
            attributes: Some(replacement.clone()),
            ..EntityChanges::default()
        },
    )
    .unwrap();

    assert_eq!(repo.get_entity(id).unwrap().attributes, replacement);
    assert_eq!(ids(repo.find_by_attribute("url", "b.example").unwrap()), vec![id]);
}
