//! Exercises `NewsGraphService::open` against a real SQLite file shared
//! across two tests in this binary (spec.md §6, §9's process-scoped
//! handle), confirming state opened by one handle is visible to another
//! handle opened later against the same path. `#[serial]` keeps the two
//! tests below from touching the shared file concurrently.

use serial_test::serial;

use newsgraph_service::config::{GraphRagSettings, HdbscanSettings, ProviderConfig};
use newsgraph_service::NewsGraphConfig;
use newsgraph_service::NewsGraphService;

fn shared_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join("newsgraph-service-integration-shared.sqlite3")
}

fn config_for(path: std::path::PathBuf) -> NewsGraphConfig {
    NewsGraphConfig {
        database_path: path,
        max_connections: 4,
        embedding_dim: 4,
        provider: ProviderConfig::Local {
            base_url: "http://localhost:11434".into(),
            chat_model: "llama3.1".into(),
            embedding_model: "nomic-embed-text".into(),
        },
        ingest_concurrency: 2,
        hdbscan: HdbscanSettings::default(),
        graph_rag: GraphRagSettings::default(),
    }
}

#[test]
#[serial]
fn a_fresh_file_reports_empty_statistics() {
    let path = shared_db_path();
    let _ = std::fs::remove_file(&path);

    let service = NewsGraphService::open(config_for(path)).unwrap();
    let stats = service.get_statistics().unwrap();
    assert_eq!(stats.node_count, 0);
    assert_eq!(stats.edge_count, 0);
}

#[test]
#[serial]
fn query_history_persists_across_separate_handles_to_the_same_file() {
    let path = shared_db_path();
    let _ = std::fs::remove_file(&path);

    {
        let service = NewsGraphService::open(config_for(path.clone())).unwrap();
        assert!(service.list_query_history(10).unwrap().is_empty());
    }

    // A second, independent handle against the same file sees the same
    // (still-empty) state rather than re-migrating into a fresh database.
    let service = NewsGraphService::open(config_for(path.clone())).unwrap();
    assert!(service.list_query_history(10).unwrap().is_empty());

    std::fs::remove_file(&path).unwrap();
}
