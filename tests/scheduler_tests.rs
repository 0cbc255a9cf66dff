// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the save scheduler

mod common;

use common::{BrokenStorage, GatedStorage, config_in, eventually, plain_jpeg, temp_dir, timestamp};
use photo_saver::app::{Notice, SharedAppState};
use photo_saver::errors::{AppError, PhotoError};
use photo_saver::pipelines::photo::{RasterRequest, SaveRequest, Scheduler, SubmitOutcome};
use photo_saver::storage::Destination;
use std::sync::Arc;
use std::time::Duration;

fn raster(seconds: u32) -> SaveRequest {
    SaveRequest::Raster(RasterRequest::new(plain_jpeg(32, 24), timestamp(seconds)))
}

fn file_name(destination: &Destination) -> String {
    match destination {
        Destination::File(path) => path.file_name().unwrap().to_string_lossy().into_owned(),
        Destination::Uri(uri) => uri.to_string(),
    }
}

#[test]
fn test_full_queue_blocks_producer() {
    let dir = temp_dir("backpressure");
    let storage = Arc::new(GatedStorage::new(dir.join("out")));
    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let scheduler = Arc::new(Scheduler::new(storage.clone(), state.clone(), config_in(&dir)).unwrap());

    // A is picked up by the worker and held at the gate
    assert_eq!(scheduler.submit(raster(1), true).unwrap(), SubmitOutcome::Queued);
    storage.wait_entered(1);

    // B fills the single queue slot
    assert_eq!(scheduler.submit(raster(2), true).unwrap(), SubmitOutcome::Queued);

    // C has nowhere to go
    let producer = {
        let scheduler = Arc::clone(&scheduler);
        std::thread::spawn(move || scheduler.submit(raster(3), true))
    };
    assert!(eventually(|| scheduler.in_flight() == 3));
    std::thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished(), "third submission should block while the queue is full");
    assert_eq!(storage.entered(), 1);

    storage.open();
    assert_eq!(producer.join().unwrap().unwrap(), SubmitOutcome::Queued);
    scheduler.wait_until_done();

    let snapshot = state.snapshot();
    let names: Vec<String> = snapshot.saved_history.iter().map(file_name).collect();
    assert_eq!(
        names,
        vec![
            "IMG_20240307_140501.jpg",
            "IMG_20240307_140502.jpg",
            "IMG_20240307_140503.jpg",
        ]
    );
    assert_eq!(scheduler.in_flight(), 0);
    assert_eq!(scheduler.queued(), 0);

    drop(scheduler);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_sync_save_waits_for_background_work() {
    let dir = temp_dir("sync-after-async");
    let storage = Arc::new(GatedStorage::new(dir.join("out")));
    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let scheduler = Arc::new(Scheduler::new(storage.clone(), state.clone(), config_in(&dir)).unwrap());

    scheduler.submit(raster(10), true).unwrap();
    storage.wait_entered(1);

    let sync = {
        let scheduler = Arc::clone(&scheduler);
        std::thread::spawn(move || scheduler.submit(raster(20), false))
    };
    std::thread::sleep(Duration::from_millis(50));
    assert!(!sync.is_finished(), "synchronous save must wait for the queued one");
    // Still only the background save has reached the storage
    assert_eq!(storage.entered(), 1);

    storage.open();
    let outcome = sync.join().unwrap().unwrap();
    let SubmitOutcome::Finished(artifact) = outcome else {
        panic!("synchronous save should finish inline");
    };
    assert_eq!(
        artifact.destination.as_ref().map(file_name).as_deref(),
        Some("IMG_20240307_140520.jpg")
    );

    let names: Vec<String> = state.snapshot().saved_history.iter().map(file_name).collect();
    assert_eq!(names, vec!["IMG_20240307_140510.jpg", "IMG_20240307_140520.jpg"]);

    drop(scheduler);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_counters_balance_after_many_saves() {
    let dir = temp_dir("counters");
    let storage = Arc::new(GatedStorage::new(dir.join("out")));
    storage.open();
    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let scheduler = Scheduler::new(storage, state.clone(), config_in(&dir)).unwrap();

    for second in 0..6 {
        scheduler.submit(raster(second), true).unwrap();
    }
    scheduler.wait_until_done();

    let snapshot = state.snapshot();
    assert_eq!(snapshot.saves_started, 6);
    assert_eq!(snapshot.saves_finished, 6);
    assert_eq!(snapshot.saves_in_progress, 0);
    assert_eq!(snapshot.saved_history.len(), 6);
    assert!(snapshot.notices.is_empty());
    assert_eq!(scheduler.in_flight(), 0);

    drop(scheduler);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_background_failure_is_reported_through_state() {
    let dir = temp_dir("failure");
    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let scheduler = Scheduler::new(Arc::new(BrokenStorage), state.clone(), config_in(&dir)).unwrap();

    assert_eq!(scheduler.submit(raster(1), true).unwrap(), SubmitOutcome::Queued);
    scheduler.wait_until_done();

    let snapshot = state.snapshot();
    assert_eq!(snapshot.notices, vec![Notice::SaveFailed]);
    assert!(snapshot.last_saved_image.is_none());
    assert_eq!(snapshot.saves_started, snapshot.saves_finished);
    assert_eq!(scheduler.in_flight(), 0);

    // Synchronous saves report the same failure to the caller
    assert!(scheduler.submit(raster(2), false).is_err());

    drop(scheduler);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_submit_after_shutdown_is_rejected() {
    let dir = temp_dir("shutdown");
    let (state, _thumbnails) = SharedAppState::new(None);
    let scheduler = Scheduler::new(Arc::new(BrokenStorage), Arc::new(state), config_in(&dir)).unwrap();

    scheduler.shutdown();
    assert!(matches!(
        scheduler.submit(raster(1), true),
        Err(AppError::Photo(PhotoError::QueueClosed))
    ));
    assert_eq!(scheduler.in_flight(), 0);

    std::fs::remove_dir_all(&dir).ok();
}
