//! Integration tests for download runs

mod common;

use common::{fast_retry, Call, FakeGateway, LocalFileSystem, RemoteAsset};
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use core_transfer::{
    DownloadConfiguration, DownloadOrchestrator, DownloadPack, DownloadQueue, PackSource,
    RunPhase, RunStatus, TransferError,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(gateway: &FakeGateway, file_system: Arc<LocalFileSystem>) -> DownloadOrchestrator {
    DownloadOrchestrator::new(gateway.shared(), EventBus::new(256), file_system, fast_retry())
}

fn asset(file_name: &str, data: &str) -> RemoteAsset {
    RemoteAsset {
        file_name: file_name.to_string(),
        data: data.as_bytes().to_vec(),
        ..RemoteAsset::default()
    }
}

fn pack(name: &str, ids: &[&str]) -> DownloadPack {
    DownloadPack::new(
        name,
        PackSource::Album {
            id: format!("album-{}", name),
        },
        ids.iter().map(|s| s.to_string()).collect(),
    )
}

#[core_async::test]
async fn test_missing_save_path_is_rejected_before_start() {
    let gateway = FakeGateway::new();
    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));

    let err = downloads
        .start(vec![pack("Trip", &["a1"])], DownloadConfiguration::default())
        .err()
        .unwrap();

    assert!(matches!(err, TransferError::Configuration(_)));
    assert_eq!(downloads.phase(), RunPhase::Idle);
    assert!(gateway.calls().is_empty());
}

#[core_async::test]
async fn test_packs_are_saved_in_named_directories() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.with_asset("a1", asset("IMG_1.JPG", "one"));
    gateway.with_asset("a2", asset("IMG_2.JPG", "two"));
    gateway.with_asset("a3", asset("cat.png", "meow"));

    let mut queue = DownloadQueue::new();
    queue.add(pack("Summer: 2024", &["a1", "a2"]));
    queue.add(pack("Cats", &["a3"]));

    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));
    let report = downloads
        .start(
            queue.snapshot(),
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded(), 3);

    let summer = dir.path().join("Summer_ 2024");
    assert_eq!(fs::read_to_string(summer.join("IMG_1.JPG")).unwrap(), "one");
    assert_eq!(fs::read_to_string(summer.join("IMG_2.JPG")).unwrap(), "two");
    assert_eq!(
        fs::read_to_string(dir.path().join("Cats").join("cat.png")).unwrap(),
        "meow"
    );

    let progress = downloads.progress();
    assert_eq!(progress.status, "Download Complete");
    assert_eq!(progress.completed, 3);
}

#[core_async::test]
async fn test_colliding_names_get_suffixes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("Trip")).unwrap();
    fs::write(dir.path().join("Trip").join("IMG.jpg"), "already here").unwrap();

    let gateway = FakeGateway::new();
    gateway.with_asset("a1", asset("IMG.jpg", "first"));
    gateway.with_asset("a2", asset("IMG.jpg", "second"));

    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));
    let report = downloads
        .start(
            vec![pack("Trip", &["a1", "a2"])],
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    let trip = dir.path().join("Trip");
    assert_eq!(fs::read_to_string(trip.join("IMG.jpg")).unwrap(), "already here");
    assert_eq!(fs::read_to_string(trip.join("IMG (1).jpg")).unwrap(), "first");
    assert_eq!(fs::read_to_string(trip.join("IMG (2).jpg")).unwrap(), "second");
    assert_eq!(report.results[1].path.as_deref(), Some(trip.join("IMG (2).jpg").as_path()));
}

#[core_async::test]
async fn test_sidecar_with_description_and_tags() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.with_asset(
        "a1",
        RemoteAsset {
            file_name: "beach.jpg".to_string(),
            data: b"jpeg".to_vec(),
            description: Some("Golden hour".to_string()),
            tags: vec!["sunset".to_string(), "beach".to_string()],
        },
    );
    gateway.with_asset("a2", asset("plain.jpg", "jpeg"));

    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));
    let config = DownloadConfiguration::default()
        .with_save_path(dir.path())
        .with_export_descriptions(true)
        .with_export_tags(true)
        .with_caption_delimiter("|");

    let report = downloads
        .start(vec![pack("Trip", &["a1", "a2"])], config)
        .unwrap()
        .wait()
        .await
        .unwrap();

    let sidecar = dir.path().join("Trip").join("beach.txt");
    assert_eq!(fs::read_to_string(&sidecar).unwrap(), "Golden hour\nsunset|beach");
    assert_eq!(report.results[0].sidecar.as_deref(), Some(sidecar.as_path()));

    // Nothing to export, no sidecar.
    assert!(!dir.path().join("Trip").join("plain.txt").exists());
    assert_eq!(report.results[1].sidecar, None);
}

#[core_async::test]
async fn test_sidecars_never_replace_existing_text_files() {
    let dir = TempDir::new().unwrap();
    let trip = dir.path().join("Trip");
    fs::create_dir_all(&trip).unwrap();
    fs::write(trip.join("IMG.txt"), "user notes").unwrap();

    let gateway = FakeGateway::new();
    for (id, name, description) in [("a1", "IMG.jpg", "first"), ("a2", "IMG.png", "second")] {
        gateway.with_asset(
            id,
            RemoteAsset {
                file_name: name.to_string(),
                data: b"data".to_vec(),
                description: Some(description.to_string()),
                tags: Vec::new(),
            },
        );
    }

    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));
    let report = downloads
        .start(
            vec![pack("Trip", &["a1", "a2"])],
            DownloadConfiguration::default()
                .with_save_path(dir.path())
                .with_export_descriptions(true),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(fs::read_to_string(trip.join("IMG.txt")).unwrap(), "user notes");
    assert_eq!(fs::read_to_string(trip.join("IMG (1).txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(trip.join("IMG (2).txt")).unwrap(), "second");
    assert_eq!(
        report.results[0].sidecar.as_deref(),
        Some(trip.join("IMG (1).txt").as_path())
    );
    assert_eq!(
        report.results[1].sidecar.as_deref(),
        Some(trip.join("IMG (2).txt").as_path())
    );
}

#[core_async::test]
async fn test_failed_asset_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.with_asset("a1", asset("one.jpg", "1"));
    gateway.with_asset("a2", asset("two.jpg", "2"));
    gateway.with_asset("a3", asset("three.jpg", "3"));
    gateway.fail_on("download_asset:a2");
    gateway.fail_on("get_original_filename:a3");

    let event_bus = EventBus::new(256);
    let mut receiver = event_bus.subscribe();
    let downloads = DownloadOrchestrator::new(
        gateway.shared(),
        event_bus,
        Arc::new(LocalFileSystem::new()),
        fast_retry(),
    );

    let report = downloads
        .start(
            vec![pack("Trip", &["a1", "a2", "a3"])],
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);

    // Transient failures are retried up to the bound.
    assert_eq!(
        gateway.count(|c| *c == Call::Download("a2".to_string())),
        3
    );
    assert_eq!(report.results[1].attempts, 3);

    // Without an original name the asset id is used.
    assert_eq!(fs::read_to_string(dir.path().join("Trip").join("a3")).unwrap(), "3");

    let mut failed = 0;
    while let Ok(event) = receiver.try_recv() {
        if let CoreEvent::Transfer(TransferEvent::ItemFailed { item, .. }) = event {
            assert_eq!(item, "a2");
            failed += 1;
        }
    }
    assert_eq!(failed, 1);
}

#[core_async::test]
async fn test_write_failure_is_recorded() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.with_asset("a1", asset("one.jpg", "1"));

    let file_system = Arc::new(LocalFileSystem::new());
    file_system.fail_write(dir.path().join("Trip").join("one.jpg"));
    let downloads = orchestrator(&gateway, file_system);

    let report = downloads
        .start(
            vec![pack("Trip", &["a1"])],
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert!(report.results[0].error.as_deref().unwrap().contains("disk full"));
}

#[core_async::test]
async fn test_cancel_stops_before_next_asset() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.with_asset("a1", asset("one.jpg", "1"));

    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));
    let handle = downloads
        .start(
            vec![pack("Trip", &["a1"])],
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap();
    assert!(downloads.cancel());

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert!(report.results.is_empty());
    assert_eq!(gateway.count(|c| matches!(c, Call::Download(_))), 0);
    assert_eq!(downloads.progress().status, "Download stopped");
    assert_eq!(downloads.phase(), RunPhase::Idle);
}

#[core_async::test]
async fn test_empty_queue_has_nothing_to_download() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    let downloads = orchestrator(&gateway, Arc::new(LocalFileSystem::new()));

    let report = downloads
        .start(
            vec![pack("Empty", &[])],
            DownloadConfiguration::default().with_save_path(dir.path()),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NothingToDo);
    assert_eq!(downloads.progress().status, "No assets to download");
}
