//! Integration tests for sftp-catalogue
//!
//! These run full crawls against an in-memory remote tree; no SFTP server
//! is needed.

use sftp_catalogue::config::CrawlConfig;
use sftp_catalogue::db::{keys, read_log, CatalogueStore};
use sftp_catalogue::error::{CrawlerError, RemoteError};
use sftp_catalogue::remote::MemoryTree;
use sftp_catalogue::resume::{DatePrefix, PathLayout, ResumeIndex};
use sftp_catalogue::walker::{CrawlState, Crawler};
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn config(dir: &TempDir) -> CrawlConfig {
    let mut config = CrawlConfig::new("/free", dir.path().join("sftp_catalogue.db"));
    config.delay = Duration::ZERO;
    config.show_progress = false;
    config
}

fn open_store(dir: &TempDir) -> CatalogueStore {
    CatalogueStore::open(&dir.path().join("sftp_catalogue.db")).unwrap()
}

fn log_paths(path: &Path) -> Vec<String> {
    read_log(path).unwrap().into_iter().map(|e| e.path).collect()
}

fn companies_house_tree() -> MemoryTree {
    let tree = MemoryTree::new();
    tree.add_file("/free/prod195/2024-01-05/Prod195_3001.zip", 1_200, 1_704_412_800);
    tree.add_file("/free/prod195/2024-02-05/Prod195_3002.zip", 1_300, 1_707_091_200);
    tree.add_file("/free/prod217/2024/02/01/Prod217_0201.dat", 900, 1_706_745_600);
    tree.add_file("/free/prod217/2024/02/02/Prod217_0202.dat", 950, 1_706_832_000);
    tree.add_file("/free/docs/readme.txt", 12, 1_700_000_000);
    tree.add_file("/free/bulkimage/2024/scan_0001.tif", 50_000_000, 1_700_000_000);
    tree
}

#[test]
fn test_two_run_scenario_adds_only_new_partition() {
    let dir = tempdir().unwrap();
    let tree = MemoryTree::new();
    tree.add_file("/free/prodABC/2024-01-10/a.csv", 100, 1_704_844_800);
    tree.add_file("/free/prodABC/2024-02-20/b.csv", 200, 1_708_387_200);

    let first = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert_eq!(first.files_new, 2);
    assert_eq!(first.catalogued, 2);

    let store = open_store(&dir);
    let boundaries = store
        .query_resume_boundaries(&PathLayout::with_default_pattern("/free"))
        .unwrap();
    assert_eq!(boundaries.get("prodABC").map(String::as_str), Some("2024-02-20"));
    drop(store);

    tree.add_file("/free/prodABC/2024-02-25/c.csv", 300, 1_708_819_200);
    tree.clear_history();

    let second = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert_eq!(second.files_new, 1);
    assert_eq!(second.catalogued, 3);
    assert_eq!(second.skipped_resume, 1);
    assert_eq!(second.boundaries, 1);

    assert!(!tree.was_listed("/free/prodABC/2024-01-10"));
    assert!(tree.was_listed("/free/prodABC/2024-02-25"));
    // the boundary partition is re-listed but contributes nothing new
    assert!(tree.was_listed("/free/prodABC/2024-02-20"));

    let log = log_paths(&dir.path().join("sftp_catalogue.jsonl"));
    assert_eq!(
        log,
        vec![
            "/free/prodABC/2024-01-10/a.csv",
            "/free/prodABC/2024-02-20/b.csv",
            "/free/prodABC/2024-02-25/c.csv",
        ]
    );
}

#[test]
fn test_recrawl_of_unchanged_tree_is_idempotent() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();

    let first = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    let before = open_store(&dir).entries().unwrap();
    let log_before = log_paths(&dir.path().join("sftp_catalogue.jsonl"));

    let second = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert_eq!(second.files_new, 0);
    assert_eq!(second.catalogued, first.catalogued);

    assert_eq!(open_store(&dir).entries().unwrap(), before);
    assert_eq!(log_paths(&dir.path().join("sftp_catalogue.jsonl")), log_before);
}

#[test]
fn test_store_and_log_hold_each_path_once() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();

    for _ in 0..3 {
        Crawler::new(config(&dir), tree.connector()).run().unwrap();
    }

    let entries = open_store(&dir).entries().unwrap();
    let mut paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
    paths.dedup();
    assert_eq!(paths.len(), entries.len());

    let mut log = log_paths(&dir.path().join("sftp_catalogue.jsonl"));
    let logged = log.len();
    log.sort();
    log.dedup();
    assert_eq!(log.len(), logged);
    assert_eq!(logged, entries.len());
}

#[test]
fn test_skip_rule_against_recorded_boundary() {
    let layout = PathLayout::with_default_pattern("/free");
    let index = ResumeIndex::from_paths(&layout, ["/free/prodX/2024-03-01/x.csv"]);
    assert_eq!(
        index.boundary("prodX"),
        Some(DatePrefix::day(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );

    assert!(index.should_skip(&layout, "/free/prodX/2024-02-15"));
    assert!(!index.should_skip(&layout, "/free/prodX/2024-03-01"));
    assert!(!index.should_skip(&layout, "/free/prodX/2024-03-02"));
    // no boundary for another product
    assert!(!index.should_skip(&layout, "/free/prodY/2020-01-01"));
}

#[test]
fn test_excluded_subtree_never_listed_or_recorded() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    tree.add_file("/free/prod195/bulkimage", 7, 0);

    let report = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert_eq!(report.excluded, 2);

    assert!(tree.listed().iter().all(|p| !p.contains("bulkimage")));
    let store = open_store(&dir);
    assert!(store.entries().unwrap().iter().all(|e| !e.path.contains("bulkimage")));
    assert!(store.exists("/free/docs/readme.txt").unwrap());
}

#[test]
fn test_custom_exclusions_replace_default() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();

    let mut cfg = config(&dir);
    cfg.exclusions = vec!["docs".to_string()];
    Crawler::new(cfg, tree.connector()).run().unwrap();

    assert!(!tree.was_listed("/free/docs"));
    assert!(tree.was_listed("/free/bulkimage"));
    assert!(open_store(&dir)
        .exists("/free/bulkimage/2024/scan_0001.tif")
        .unwrap());
}

#[test]
fn test_session_lost_keeps_durable_prefix() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    // /free, /free/prod195, /free/prod195/2024-01-05
    tree.drop_session_after(3);

    let crawler = Crawler::new(config(&dir), tree.connector());
    let err = crawler.run().unwrap_err();
    assert!(matches!(
        err,
        CrawlerError::Listing {
            source: RemoteError::SessionLost { .. },
            ..
        }
    ));
    assert!(matches!(crawler.state(), CrawlState::Failed { .. }));

    let store = open_store(&dir);
    assert_eq!(store.count().unwrap(), 1);
    assert!(store
        .exists("/free/prod195/2024-01-05/Prod195_3001.zip")
        .unwrap());
    assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("failed"));
    drop(store);

    // every logged record is also in the store
    let log = log_paths(&dir.path().join("sftp_catalogue.jsonl"));
    assert_eq!(log, vec!["/free/prod195/2024-01-05/Prod195_3001.zip"]);

    // the next run picks up the rest without duplicating the first file
    tree.clear_failures();
    let report = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert_eq!(report.catalogued, 5);
    assert_eq!(log_paths(&dir.path().join("sftp_catalogue.jsonl")).len(), 5);
}

#[test]
fn test_unreadable_subtree_is_abandoned() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    tree.fail_listing(
        "/free/prod217/2024",
        RemoteError::PermissionDenied {
            path: "/free/prod217/2024".into(),
        },
    );

    let report = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.abandoned.len(), 1);
    assert_eq!(report.abandoned[0].path, "/free/prod217/2024");
    assert_eq!(report.catalogued, 3);

    let store = open_store(&dir);
    assert_eq!(store.get_info(keys::ABANDONED).unwrap().as_deref(), Some("1"));
    assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("completed"));
}

#[test]
fn test_missing_root_is_fatal() {
    let dir = tempdir().unwrap();
    let tree = MemoryTree::new();
    tree.add_file("/other/a.csv", 1, 0);

    let err = Crawler::new(config(&dir), tree.connector())
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        CrawlerError::Listing {
            source: RemoteError::NotFound { .. },
            ..
        }
    ));
    assert_eq!(err.remote_path(), Some("/free"));
}

#[test]
fn test_connection_failure_writes_nothing() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    tree.fail_connect(RemoteError::AuthFailed {
        username: "me".into(),
        reason: "publickey denied".into(),
    });

    let err = Crawler::new(config(&dir), tree.connector())
        .run()
        .unwrap_err();
    assert!(matches!(err, CrawlerError::Remote(_)));
    assert!(tree.listed().is_empty());
    assert_eq!(open_store(&dir).count().unwrap(), 0);
    assert!(read_log(&dir.path().join("sftp_catalogue.jsonl"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_parallel_crawl_matches_sequential() {
    let tree = companies_house_tree();
    for n in 0..8 {
        tree.add_file(&format!("/free/prod{n}00/2024-04-0{}/f.csv", n + 1), 10, 0);
    }

    let seq_dir = tempdir().unwrap();
    let seq = Crawler::new(config(&seq_dir), tree.connector()).run().unwrap();

    let par_dir = tempdir().unwrap();
    let mut cfg = config(&par_dir);
    cfg.worker_count = 4;
    cfg.max_listings = 2;
    let par = Crawler::new(cfg, tree.connector()).run().unwrap();

    assert_eq!(par.workers, 4);
    assert_eq!(par.files_new, seq.files_new);
    assert_eq!(par.excluded, seq.excluded);
    assert_eq!(
        open_store(&seq_dir).entries().unwrap(),
        open_store(&par_dir).entries().unwrap()
    );

    let mut seq_log = log_paths(&seq_dir.path().join("sftp_catalogue.jsonl"));
    let mut par_log = log_paths(&par_dir.path().join("sftp_catalogue.jsonl"));
    seq_log.sort();
    par_log.sort();
    assert_eq!(seq_log, par_log);
}

#[test]
fn test_max_depth_limits_traversal() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();

    let mut cfg = config(&dir);
    cfg.max_depth = Some(2);
    let report = Crawler::new(cfg, tree.connector()).run().unwrap();

    // prod195 date dirs sit at depth 2; prod217 files need depth 4
    let store = open_store(&dir);
    assert!(store
        .exists("/free/prod195/2024-02-05/Prod195_3002.zip")
        .unwrap());
    assert!(!store
        .exists("/free/prod217/2024/02/01/Prod217_0201.dat")
        .unwrap());
    assert!(report.ignored > 0);
}

#[test]
fn test_nested_partitions_resume() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    Crawler::new(config(&dir), tree.connector()).run().unwrap();

    tree.add_file("/free/prod217/2024/02/03/Prod217_0203.dat", 990, 1_706_918_400);
    tree.add_file("/free/prod217/2023/12/31/Prod217_1231.dat", 990, 1_703_980_800);
    tree.clear_history();

    let report = Crawler::new(config(&dir), tree.connector()).run().unwrap();
    assert!(!tree.was_listed("/free/prod217/2024/02/01"));
    assert!(!tree.was_listed("/free/prod217/2023"));
    assert!(tree.was_listed("/free/prod217/2024/02/03"));

    let store = open_store(&dir);
    assert!(store
        .exists("/free/prod217/2024/02/03/Prod217_0203.dat")
        .unwrap());
    // older than the boundary, so never seen
    assert!(!store
        .exists("/free/prod217/2023/12/31/Prod217_1231.dat")
        .unwrap());
    assert_eq!(report.files_new, 1);
}

#[test]
fn test_crawl_info_recorded() {
    let dir = tempdir().unwrap();
    let tree = companies_house_tree();
    Crawler::new(config(&dir), tree.connector()).run().unwrap();

    let store = open_store(&dir);
    assert_eq!(store.get_info(keys::SOURCE).unwrap().as_deref(), Some("memory://"));
    assert_eq!(store.get_info(keys::ROOT).unwrap().as_deref(), Some("/free"));
    assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("completed"));
    assert_eq!(store.get_info(keys::FILES_NEW).unwrap().as_deref(), Some("5"));
    assert!(store.get_info(keys::END_TIME).unwrap().is_some());
}

#[test]
fn test_log_records_are_complete_json() {
    let dir = tempdir().unwrap();
    let tree = MemoryTree::new();
    tree.add_file("/free/prod100/2024-01-02/a.csv", 42, 1_704_153_600);
    Crawler::new(config(&dir), tree.connector()).run().unwrap();

    let raw = std::fs::read_to_string(dir.path().join("sftp_catalogue.jsonl")).unwrap();
    assert_eq!(
        raw,
        "{\"path\":\"/free/prod100/2024-01-02/a.csv\",\"size_bytes\":42,\"last_modified\":\"2024-01-02T00:00:00\"}\n"
    );

    let stored = open_store(&dir)
        .get("/free/prod100/2024-01-02/a.csv")
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_modified_iso(), "2024-01-02T00:00:00");
    assert_eq!(stored.size_bytes, 42);
}
