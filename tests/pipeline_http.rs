//! End-to-end runs against a mock HTTP server
//!
//! These tests drive [`DownloadManager::run`] with the production fetcher,
//! the `lopdf` validator and the file system persister.

mod common;

use std::sync::Arc;

use common::{
    DocumentServer, HEADER_ONLY, HTML_PAGE, input_table, one_page_pdf, pdf_with_pages, strings,
    test_config,
};
use pdf_dl::{DownloadManager, MemoryTable, NoOpMonitor, SqliteTable, Table, TableMode};
use tempfile::TempDir;

async fn manager(dir: &TempDir) -> DownloadManager {
    DownloadManager::new(test_config(dir.path()))
        .await
        .expect("manager")
}

#[tokio::test]
async fn failed_primary_is_replaced_by_fallback() {
    let server = DocumentServer::start().await;
    server.fail("/missing.pdf", 404).await;
    server.serve("/mirror/A001.pdf", one_page_pdf()).await;
    let dir = TempDir::new().unwrap();

    let input = input_table(&[(
        "A001",
        server.url("/missing.pdf").as_str(),
        server.url("/mirror/A001.pdf").as_str(),
    )]);
    let mut metadata = MemoryTable::new();

    let summary = manager(&dir)
        .await
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();

    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.fallbacks, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.download_failed, 1);

    assert_eq!(metadata.get_column("BRnum"), strings(&["A001", "A001"]));
    assert_eq!(metadata.get_column("Fallback"), strings(&["No", "Yes"]));
    assert_eq!(metadata.get_column("Downloaded"), strings(&["No", "Yes"]));
    let errors = metadata.get_column("Error");
    assert!(errors[0].starts_with("download error: HTTP 404"), "{errors:?}");
    assert_eq!(errors[1], "");

    let saved = std::fs::read(dir.path().join("A001.pdf")).unwrap();
    assert_eq!(saved, one_page_pdf());
}

#[tokio::test]
async fn unsupported_scheme_fails_without_a_request() {
    let server = DocumentServer::start().await;
    server.serve("/B.pdf", one_page_pdf()).await;
    let dir = TempDir::new().unwrap();

    let input = input_table(&[("B", "bad://url", server.url("/B.pdf").as_str())]);
    let mut metadata = MemoryTable::new();

    manager(&dir)
        .await
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();

    let errors = metadata.get_column("Error");
    assert!(errors[0].contains("unsupported scheme"), "{errors:?}");
    assert_eq!(metadata.get_column("Downloaded"), strings(&["No", "Yes"]));
    assert_eq!(server.hits("/B.pdf").await, 1);
}

#[tokio::test]
async fn invalid_documents_fail_the_check_stage() {
    let server = DocumentServer::start().await;
    server.serve("/empty.pdf", pdf_with_pages(0)).await;
    server.serve("/page.html", HTML_PAGE.to_vec()).await;
    server.serve("/broken.pdf", HEADER_ONLY.to_vec()).await;
    let dir = TempDir::new().unwrap();

    let input = input_table(&[
        ("C1", server.url("/empty.pdf").as_str(), ""),
        ("C2", server.url("/page.html").as_str(), ""),
        ("C3", server.url("/broken.pdf").as_str(), ""),
    ]);
    let mut metadata = MemoryTable::new();

    let summary = manager(&dir)
        .await
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();

    assert_eq!(summary.checking_failed, 3);
    assert_eq!(summary.fallbacks, 0);
    assert_eq!(metadata.get_column("BRnum"), strings(&["C1", "C2", "C3"]));

    let errors = metadata.get_column("Error");
    assert_eq!(errors[0], "document invalid: contains zero pages");
    assert_eq!(errors[1], "document invalid: no PDF header");
    assert!(errors[2].starts_with("document failed to open"), "{errors:?}");

    let written = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn sqlite_report_survives_reopen_and_rerun_is_a_no_op() {
    let server = DocumentServer::start().await;
    server.serve("/D1.pdf", one_page_pdf()).await;
    server.serve("/D2.pdf", pdf_with_pages(3)).await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metadata.db");
    let out = dir.path().join("docs");

    let input = input_table(&[
        ("D2", server.url("/D2.pdf").as_str(), ""),
        ("D1", server.url("/D1.pdf").as_str(), ""),
    ]);
    let manager = DownloadManager::new(test_config(&out)).await.unwrap();

    let mut metadata = SqliteTable::open(&db, TableMode::ReadWrite).await.unwrap();
    let first = manager
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();
    metadata.close().await;
    assert_eq!(first.done, 2);

    let mut metadata = SqliteTable::open(&db, TableMode::ReadWrite).await.unwrap();
    assert_eq!(metadata.get_column("BRnum"), strings(&["D1", "D2"]));
    assert_eq!(metadata.get_column("Downloaded"), strings(&["Yes", "Yes"]));

    let second = manager
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();
    assert_eq!(second.admitted, 0);
    assert_eq!(metadata.get_column("BRnum"), strings(&["D1", "D2"]));
    assert_eq!(server.hits("/D1.pdf").await, 1);
    assert_eq!(server.hits("/D2.pdf").await, 1);

    assert!(out.join("D1.pdf").exists());
    assert!(out.join("D2.pdf").exists());
}

#[tokio::test]
async fn forced_metadata_table_starts_empty() {
    let server = DocumentServer::start().await;
    server.serve("/E.pdf", one_page_pdf()).await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metadata.db");

    let seeded = SqliteTable::import_rows(&db, [("BRnum", strings(&["E"]))])
        .await
        .unwrap();
    seeded.close().await;

    let input = input_table(&[("E", server.url("/E.pdf").as_str(), "")]);
    let mut metadata = SqliteTable::open(&db, TableMode::Create).await.unwrap();
    let summary = manager(&dir)
        .await
        .run(&input, &mut metadata, Arc::new(NoOpMonitor))
        .await
        .unwrap();

    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(metadata.get_column("BRnum"), strings(&["E"]));
}
