use hoard_core::db::{open_db_in_memory, open_db_with_capabilities, DbTarget};
use hoard_core::{
    matcher_for, Attributes, Capabilities, Database, EntityChanges, EntityRepository,
    EntityService, MatcherKind, NewEntity, SqliteEntityRepository,
};

fn degraded_db() -> Database {
    open_db_with_capabilities(DbTarget::Memory, Capabilities::NONE).unwrap()
}

fn seed_alices<R: EntityRepository>(service: &EntityService<R>) {
    service
        .add("person", "Alice Smith", "met at the conference", Attributes::new())
        .unwrap();
    service
        .add("person", "Alice Jones", "works on compilers", Attributes::new())
        .unwrap();
}

fn names(hits: &[hoard_core::SearchHit]) -> Vec<&str> {
    hits.iter().map(|hit| hit.entity.name.as_str()).collect()
}

#[test]
fn alice_scenario_with_fulltext() {
    let db = open_db_in_memory().unwrap();
    assert!(db.capabilities().has_fulltext);
    let service = EntityService::with_detected(SqliteEntityRepository::new(&db));
    seed_alices(&service);

    let both = service.find("Alice").unwrap();
    assert_eq!(both.len(), 2);

    let smith = service.find("Smith").unwrap();
    assert_eq!(names(&smith), vec!["Alice Smith"]);
}

#[test]
fn alice_scenario_without_fulltext() {
    for kind in [MatcherKind::Heuristic, MatcherKind::detect()] {
        let db = degraded_db();
        let service = EntityService::new(SqliteEntityRepository::new(&db), Capabilities::NONE, kind);
        seed_alices(&service);

        let both = service.find("alice").unwrap();
        assert_eq!(both.len(), 2, "matcher {}", kind.as_str());

        let smith = service.find("Smith").unwrap();
        assert_eq!(names(&smith), vec!["Alice Smith"], "matcher {}", kind.as_str());
    }
}

#[test]
fn injected_capabilities_override_engine_support() {
    let db = open_db_in_memory().unwrap();
    let service = EntityService::new(
        SqliteEntityRepository::new(&db),
        Capabilities::NONE,
        MatcherKind::Heuristic,
    );
    seed_alices(&service);

    assert!(!service.capabilities().has_fulltext);
    assert_eq!(names(&service.find("jones").unwrap()), vec!["Alice Jones"]);
}

#[cfg(feature = "fuzzy")]
#[test]
fn typo_still_finds_entity_with_fuzzy_matcher() {
    let mut attributes = Attributes::new();
    attributes.insert("url".to_string(), serde_json::json!("example.com"));

    for capabilities in [Capabilities::ALL, Capabilities::NONE] {
        let db = open_db_with_capabilities(DbTarget::Memory, capabilities).unwrap();
        let service = EntityService::new(
            SqliteEntityRepository::new(&db),
            capabilities,
            MatcherKind::Fuzzy,
        );
        let example = service
            .add("website", "Example", "a test site", attributes.clone())
            .unwrap();
        service
            .add("person", "Grace Hopper", "navy", Attributes::new())
            .unwrap();

        let hits = service.find("exmple").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity.id, example.id);
        assert!(hits[0].score > 0.0);
    }
}

#[test]
fn heuristic_fallback_has_no_false_positives() {
    let db = degraded_db();
    let service = EntityService::new(
        SqliteEntityRepository::new(&db),
        Capabilities::NONE,
        MatcherKind::Heuristic,
    );
    let fixtures = [
        ("person", "Alice Smith", "likes rust"),
        ("person", "Bob Stone", "writes go"),
        ("website", "Rust Blog", "weekly posts"),
        ("feature", "Dark mode", "toggle in settings"),
        ("website", "Example", "a test site"),
    ];
    for (category, name, notes) in fixtures {
        service.add(category, name, notes, Attributes::new()).unwrap();
    }

    for query in ["rust", "exmple", "blog weekly", "st", "mode dark", "zzz", "Smith go"] {
        for hit in service.find(query).unwrap() {
            assert!(
                hit.entity.contains_all_tokens(query),
                "`{}` returned for `{query}`",
                hit.entity.name
            );
        }
    }
    assert!(service.find("exmple").unwrap().is_empty());
}

#[test]
fn fallback_results_are_ranked_by_score() {
    let db = degraded_db();
    let service = EntityService::new(
        SqliteEntityRepository::new(&db),
        Capabilities::NONE,
        MatcherKind::Heuristic,
    );
    service
        .add("website", "Rusty tools", "rust adjacent", Attributes::new())
        .unwrap();
    service
        .add("website", "Rust", "", Attributes::new())
        .unwrap();

    let hits = service.find("rust").unwrap();
    assert_eq!(hits.len(), 2);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn blank_query_lists_everything_in_insertion_order() {
    let db = open_db_in_memory().unwrap();
    let service = EntityService::with_detected(SqliteEntityRepository::new(&db));
    seed_alices(&service);

    let hits = service.find("   ").unwrap();
    assert_eq!(names(&hits), vec!["Alice Smith", "Alice Jones"]);
    assert!(hits.iter().all(|hit| hit.score == 0.0));
}

#[test]
fn fulltext_matches_prefixes_and_attribute_values() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::new(&db);
    let example = repo
        .insert_entity(&NewEntity::new("website", "Example").with_attribute("url", "example.com"))
        .unwrap();
    repo.insert_entity(&NewEntity::new("person", "Alice Smith"))
        .unwrap();

    let prefix = repo.search_text("ali").unwrap();
    assert_eq!(prefix.len(), 1);
    assert_eq!(prefix[0].name, "Alice Smith");

    let by_attribute = repo.search_text("example.com").unwrap();
    assert_eq!(by_attribute.len(), 1);
    assert_eq!(by_attribute[0].id, example);
}

#[test]
fn fulltext_index_follows_updates_and_deletes() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::new(&db);
    let id = repo
        .insert_entity(&NewEntity::new("feature", "Sync").with_notes("alpha text"))
        .unwrap();

    repo.update_entity(id, &EntityChanges::notes("beta text")).unwrap();
    assert!(repo.search_text("alpha").unwrap().is_empty());
    assert_eq!(repo.search_text("beta").unwrap().len(), 1);

    repo.delete_entity(id).unwrap();
    assert!(repo.search_text("beta").unwrap().is_empty());
}

#[test]
fn search_text_tolerates_fts_operator_characters() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::new(&db);
    repo.insert_entity(&NewEntity::new("person", "Alice Smith"))
        .unwrap();

    for query in ["\"alice", "a:b", "NOT", "alice AND", "(smith"] {
        repo.search_text(query).unwrap();
    }
    assert!(repo.search_text("").unwrap().is_empty());
}

#[test]
fn substring_search_is_case_insensitive_and_unicode_aware() {
    let db = degraded_db();
    let repo = SqliteEntityRepository::new(&db);
    repo.insert_entity(&NewEntity::new("person", "Émile Zola").with_notes("Naturalisme"))
        .unwrap();

    assert_eq!(repo.search_text("émile").unwrap().len(), 1);
    assert_eq!(repo.search_text("NATURAL zola").unwrap().len(), 1);
    assert!(repo.search_text("zola balzac").unwrap().is_empty());
}

#[test]
fn rank_is_deterministic() {
    let candidates = ["Alice Smith", "Alice Jones", "Bob", "alice", "Malice"];
    for kind in [MatcherKind::Heuristic, MatcherKind::detect()] {
        let matcher = matcher_for(kind);
        let first = matcher.rank("alice", &candidates);
        for _ in 0..10 {
            assert_eq!(matcher.rank("alice", &candidates), first);
        }
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                assert!(pair[0].index < pair[1].index);
            }
        }
    }
}

fn seed_languages<R: EntityRepository>(service: &EntityService<R>) {
    let mut attributes = Attributes::new();
    attributes.insert("url".to_string(), serde_json::json!("example.com"));
    service
        .add("website", "Example", "a test site", attributes)
        .unwrap();
    service
        .add("language", "Cobol", "business records", Attributes::new())
        .unwrap();
    service
        .add("language", "C++ notes", "templates {braces}", Attributes::new())
        .unwrap();
}

#[test]
fn fulltext_and_substring_paths_return_the_same_entities() {
    let queries = [
        "website",
        "example",
        "example.com",
        "test site",
        "temp",
        "url",
        "c++",
        "{",
        "!!!",
    ];
    let expected: Vec<Vec<&str>> = vec![
        vec![],
        vec!["Example"],
        vec!["Example"],
        vec!["Example"],
        vec!["C++ notes"],
        vec!["Example"],
        vec!["C++ notes"],
        vec!["C++ notes"],
        vec![],
    ];

    for capabilities in [Capabilities::ALL, Capabilities::NONE] {
        let db = open_db_with_capabilities(DbTarget::Memory, capabilities).unwrap();
        let service = EntityService::new(
            SqliteEntityRepository::new(&db),
            capabilities,
            MatcherKind::Heuristic,
        );
        seed_languages(&service);

        for (query, expected) in queries.iter().zip(&expected) {
            let mut found = names(&service.find(query).unwrap())
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>();
            found.sort();
            assert_eq!(
                &found, expected,
                "query `{query}` with fulltext={}",
                capabilities.has_fulltext
            );
        }
    }
}

#[test]
fn punctuated_queries_bypass_the_fulltext_index() {
    let db = open_db_in_memory().unwrap();
    let service = EntityService::with_detected(SqliteEntityRepository::new(&db));
    seed_languages(&service);
    let repo = SqliteEntityRepository::new(&db);

    let names_of = |entities: Vec<hoard_core::Entity>| {
        entities.into_iter().map(|entity| entity.name).collect::<Vec<_>>()
    };
    assert_eq!(names_of(repo.search_text("c++").unwrap()), vec!["C++ notes"]);
    assert!(repo.search_text("!!!").unwrap().is_empty());
    assert!(repo.search_text("{").unwrap().iter().all(|entity| entity.name == "C++ notes"));
}

#[test]
fn attribute_only_hits_get_a_nonzero_score() {
    for kind in [MatcherKind::Heuristic, MatcherKind::detect()] {
        let db = open_db_in_memory().unwrap();
        let service = EntityService::new(
            SqliteEntityRepository::new(&db),
            Capabilities::ALL,
            kind,
        );
        let mut attributes = Attributes::new();
        attributes.insert("host".to_string(), serde_json::json!("lighthouse"));
        service.add("website", "Portal", "", attributes).unwrap();

        let hits = service.find("lighthouse").unwrap();
        assert_eq!(names(&hits), vec!["Portal"]);
        assert!(hits[0].score > 0.0, "matcher {}", kind.as_str());
    }
}
