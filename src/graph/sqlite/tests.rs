use super::*;
use tempfile::TempDir;

const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn store() -> SqliteGraphStore {
    SqliteGraphStore::open_in_memory().unwrap()
}

fn link<'a>(repository_id: &'a str, author_email: &'a str, hash: &'a str) -> CommitLink<'a> {
    CommitLink {
        repository_id,
        author_email,
        hash,
        timestamp: "2024-01-01T00:00:00Z",
    }
}

fn bootstrap(store: &mut SqliteGraphStore) {
    for constraint in Constraint::ALL {
        store
            .execute(Statement::DeclareConstraint(constraint))
            .unwrap();
    }
}

#[test]
fn test_parse_graph_uri_forms() {
    assert_eq!(GraphUri::parse("sqlite::memory:").unwrap(), GraphUri::Memory);
    assert_eq!(
        GraphUri::parse("sqlite:///var/lib/waterfall/graph.db").unwrap(),
        GraphUri::File(PathBuf::from("/var/lib/waterfall/graph.db"))
    );
    assert_eq!(
        GraphUri::parse("file:graph.db").unwrap(),
        GraphUri::File(PathBuf::from("graph.db"))
    );
    assert_eq!(
        GraphUri::parse("file:///tmp/graph.db").unwrap(),
        GraphUri::File(PathBuf::from("/tmp/graph.db"))
    );
    assert_eq!(
        GraphUri::parse("./data/graph.db").unwrap(),
        GraphUri::File(PathBuf::from("./data/graph.db"))
    );
}

#[test]
fn test_parse_graph_uri_rejects_other_schemes() {
    let err = GraphUri::parse("bolt://localhost:7687").unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedScheme(ref s) if s == "bolt"));
}

#[test]
fn test_parse_graph_uri_rejects_empty() {
    assert!(matches!(
        GraphUri::parse("  ").unwrap_err(),
        StoreError::ConnectionFailed { .. }
    ));
    assert!(matches!(
        GraphUri::parse("sqlite://").unwrap_err(),
        StoreError::ConnectionFailed { .. }
    ));
}

#[test]
fn test_open_file_store_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("graph.db");
    let uri = format!("sqlite://{}", path.display());

    let mut store = SqliteGraphStore::open(&uri, Duration::from_millis(100)).unwrap();
    store
        .execute(Statement::MergeRepository { id: "acme/myrepo" })
        .unwrap();
    drop(store);

    assert!(path.exists());
    let reopened = SqliteGraphStore::open(&uri, Duration::from_millis(100)).unwrap();
    assert_eq!(reopened.stats().unwrap().repositories, 1);
}

#[test]
fn test_open_unsupported_scheme() {
    let result = SqliteGraphStore::open("neo4j://localhost", Duration::from_secs(1));
    assert!(matches!(result, Err(StoreError::UnsupportedScheme(_))));
}

#[test]
fn test_declare_constraint_twice_reports_exists() {
    let mut store = store();
    for constraint in Constraint::ALL {
        assert_eq!(
            store
                .execute(Statement::DeclareConstraint(constraint))
                .unwrap(),
            Outcome::Created
        );
    }
    for constraint in Constraint::ALL {
        assert_eq!(
            store
                .execute(Statement::DeclareConstraint(constraint))
                .unwrap(),
            Outcome::ConstraintExists
        );
    }
}

#[test]
fn test_merge_repository_is_idempotent() {
    let mut store = store();
    bootstrap(&mut store);

    let first = store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();
    let second = store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();

    assert_eq!(first, Outcome::Created);
    assert_eq!(second, Outcome::Matched);
    assert_eq!(store.stats().unwrap().repositories, 1);
}

#[test]
fn test_same_key_different_labels_are_distinct() {
    let mut store = store();
    store
        .execute(Statement::MergeRepository { id: "x" })
        .unwrap();
    assert_eq!(
        store.execute(Statement::MergeAuthor { email: "x" }).unwrap(),
        Outcome::Created
    );

    let stats = store.stats().unwrap();
    assert_eq!(stats.repositories, 1);
    assert_eq!(stats.authors, 1);
}

#[test]
fn test_merge_author_is_idempotent() {
    let mut store = store();
    bootstrap(&mut store);

    for _ in 0..3 {
        store
            .execute(Statement::MergeAuthor { email: "alice@x" })
            .unwrap();
    }
    assert_eq!(store.stats().unwrap().authors, 1);
}

#[test]
fn test_merge_commit_stores_properties() {
    let mut store = store();
    bootstrap(&mut store);
    store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();
    store
        .execute(Statement::MergeAuthor { email: "alice@x" })
        .unwrap();

    let outcome = store
        .execute(Statement::MergeCommit(link("myrepo", "alice@x", HASH_A)))
        .unwrap();
    assert_eq!(outcome, Outcome::Created);

    let properties = store.commit_properties(HASH_A).unwrap().unwrap();
    assert_eq!(properties.hash, HASH_A);
    assert_eq!(properties.timestamp, "2024-01-01T00:00:00Z");
    assert!(store.commit_properties(HASH_B).unwrap().is_none());
}

#[test]
fn test_commit_hash_is_globally_unique() {
    let mut store = store();
    bootstrap(&mut store);
    for id in ["repo1", "repo2"] {
        store.execute(Statement::MergeRepository { id }).unwrap();
    }
    store
        .execute(Statement::MergeAuthor { email: "alice@x" })
        .unwrap();

    let first = store
        .execute(Statement::MergeCommit(link("repo1", "alice@x", HASH_A)))
        .unwrap();
    let second = store
        .execute(Statement::MergeCommit(link("repo2", "alice@x", HASH_A)))
        .unwrap();

    assert_eq!(first, Outcome::Created);
    assert_eq!(second, Outcome::Matched);
    assert_eq!(store.stats().unwrap().commits, 1);
}

#[test]
fn test_merge_commit_without_author_is_missing_endpoint() {
    let mut store = store();
    bootstrap(&mut store);
    store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();

    let err = store
        .execute(Statement::MergeCommit(link("myrepo", "ghost@x", HASH_A)))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingEndpoint { ref author, .. } if author == "ghost@x"));
    assert_eq!(store.stats().unwrap().commits, 0);
}

#[test]
fn test_merge_commit_without_repository_is_missing_endpoint() {
    let mut store = store();
    store
        .execute(Statement::MergeAuthor { email: "alice@x" })
        .unwrap();

    let err = store
        .execute(Statement::MergeCommit(link("nowhere", "alice@x", HASH_A)))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingEndpoint { .. }));
}

#[test]
fn test_merges_are_idempotent_without_constraints() {
    let mut store = store();
    store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();
    store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();
    store
        .execute(Statement::MergeAuthor { email: "alice@x" })
        .unwrap();
    store
        .execute(Statement::MergeCommit(link("myrepo", "alice@x", HASH_A)))
        .unwrap();
    store
        .execute(Statement::MergeCommit(link("myrepo", "alice@x", HASH_A)))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.repositories, 1);
    assert_eq!(stats.commits, 1);
}

#[test]
fn test_stats_counts_commits_by_author() {
    let mut store = store();
    bootstrap(&mut store);
    store
        .execute(Statement::MergeRepository { id: "myrepo" })
        .unwrap();
    for email in ["bob@x", "alice@x"] {
        store.execute(Statement::MergeAuthor { email }).unwrap();
    }
    store
        .execute(Statement::MergeCommit(link("myrepo", "alice@x", HASH_A)))
        .unwrap();
    store
        .execute(Statement::MergeCommit(link("myrepo", "bob@x", HASH_B)))
        .unwrap();
    store
        .execute(Statement::MergeCommit(link(
            "myrepo",
            "alice@x",
            "cccccccccccccccccccccccccccccccccccccccc",
        )))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.commits, 3);
    assert_eq!(
        stats.commits_by_author,
        vec![("alice@x".to_string(), 2), ("bob@x".to_string(), 1)]
    );
}

#[test]
fn test_constraint_rejects_existing_duplicates() {
    let store = store();
    // Duplicates written behind the store's back
    store
        .conn
        .execute_batch(
            "INSERT INTO nodes (label, key) VALUES ('Author', 'dup@x');
             INSERT INTO nodes (label, key) VALUES ('Author', 'dup@x');",
        )
        .unwrap();

    let mut store = store;
    let result = store.execute(Statement::DeclareConstraint(Constraint::AuthorId));
    assert!(matches!(result, Err(StoreError::Statement(_))));
}
