use std::fs;
use std::sync::Arc;

use chrono::Duration;
use pathtrack_rs::config::EngineConfig;
use pathtrack_rs::export::DirectoryExporter;
use pathtrack_rs::frame::Frame;
use pathtrack_rs::session::{ManualClock, SessionRegistry, SessionRequest, SessionState};
use pathtrack_rs::tracker::{Region, ScriptedTracker, TrackingCapability};
use pathtrack_rs::RegistryError;
use tempfile::tempdir;

fn drifting(_: u32) -> Box<dyn TrackingCapability> {
    Box::new(ScriptedTracker::drifting(5, 0))
}

fn request() -> SessionRequest {
    SessionRequest::new(vec![Region::new(10, 10, 20, 20)], false)
}

#[test]
fn test_evict_expired_by_age() {
    let clock = Arc::new(ManualClock::default());
    let registry = SessionRegistry::new(EngineConfig::default(), Arc::new(drifting))
        .unwrap()
        .with_clock(clock.clone());

    let old = registry.create(&request()).unwrap();
    clock.advance(Duration::hours(2));
    let young = registry.create(&request()).unwrap();
    // old is now 25 hours old, young 23
    clock.advance(Duration::hours(23));

    let evicted = registry.evict_expired(24.0);
    assert_eq!(evicted, vec![old.clone()]);
    assert!(matches!(registry.lookup(&old), Err(RegistryError::NotFound(_))));
    assert!(registry.lookup(&young).is_ok());
}

#[test]
fn test_eviction_covers_archived_sessions() {
    let clock = Arc::new(ManualClock::default());
    let root = tempdir().unwrap();
    let exporter = Arc::new(DirectoryExporter::new(root.path()));
    let registry = SessionRegistry::new(EngineConfig::default(), Arc::new(drifting))
        .unwrap()
        .with_clock(clock.clone())
        .with_exporter(exporter.clone());

    let id = registry.create(&request()).unwrap();
    registry.process_frame(&id, &Frame::blank(100, 100, 3)).unwrap();
    registry.stop(&id).unwrap();
    assert!(exporter.session_dir(&id).join("report.json").exists());
    assert_eq!(registry.health().archived, 1);

    clock.advance(Duration::hours(25));
    let summary = registry.cleanup().unwrap();
    assert_eq!(summary.evicted, vec![id.clone()]);
    assert_eq!(summary.stale_artifacts, 0);
    assert!(!exporter.session_dir(&id).exists());
    assert_eq!(registry.health().total, 0);
}

#[test]
fn test_stop_exports_rows() {
    let root = tempdir().unwrap();
    let registry = SessionRegistry::new(EngineConfig::default(), Arc::new(drifting))
        .unwrap()
        .with_exporter(Arc::new(DirectoryExporter::new(root.path())));

    let id = registry.create(&request()).unwrap();
    for _ in 0..3 {
        registry.process_frame(&id, &Frame::blank(100, 100, 3)).unwrap();
    }
    let report = registry.stop(&id).unwrap();
    assert_eq!(report.total_frames, 3);
    assert_eq!(report.targets[0].point_count, 4);
    assert_eq!(report.targets[0].total_distance, 15.0);

    let dir = root.path().join(format!("session_{id}"));
    let csv = fs::read_to_string(dir.join("tracking_data.csv")).unwrap();
    // header plus one row per path point
    assert_eq!(csv.lines().count(), 5);
    assert!(csv.lines().last().unwrap().starts_with("1,3,35,20,Moving,15.0,"));
}

#[test]
fn test_list_reports_progress_and_results() {
    let clock = Arc::new(ManualClock::default());
    let registry = SessionRegistry::new(EngineConfig::default(), Arc::new(drifting))
        .unwrap()
        .with_clock(clock.clone());

    let first = registry.create(&request()).unwrap();
    clock.advance(Duration::seconds(1));
    let second = registry
        .create(&SessionRequest::new(
            vec![Region::new(0, 0, 10, 10), Region::new(40, 40, 10, 10)],
            true,
        ))
        .unwrap();

    registry.process_frame(&first, &Frame::blank(100, 100, 3)).unwrap();
    registry.process_frame(&first, &Frame::blank(100, 100, 3)).unwrap();
    registry.stop(&first).unwrap();

    let listing = registry.list();
    assert_eq!(listing.len(), 2);

    assert_eq!(listing[0].id, first);
    assert_eq!(listing[0].frame_count, 2);
    assert!(!listing[0].is_active);
    assert!(listing[0].has_results);

    assert_eq!(listing[1].id, second);
    assert_eq!(listing[1].target_count, 2);
    assert_eq!(listing[1].frame_count, 0);
    assert!(listing[1].is_active);
    assert!(!listing[1].has_results);

    let json = serde_json::to_value(&listing[1]).unwrap();
    assert_eq!(json["targetCount"], 2);
    assert_eq!(json["isActive"], true);
    assert!(json.get("createdAt").is_some());
}

#[test]
fn test_sessions_are_independent() {
    let registry = Arc::new(SessionRegistry::new(EngineConfig::default(), Arc::new(drifting)).unwrap());
    let ids: Vec<_> = (0..4).map(|_| registry.create(&request()).unwrap()).collect();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    registry.process_frame(&id, &Frame::blank(100, 100, 3)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in &ids {
        let session = registry.lookup(id).unwrap();
        assert_eq!(session.frame_count(), 20);
        assert_eq!(session.state(), SessionState::Active);
        session.with_targets(|targets| assert_eq!(targets[0].total_distance(), 100.0));
    }
}

#[test]
fn test_cleanup_sweeps_temp_dir() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("frame_0001.jpg"), b"x").unwrap();

    let config = EngineConfig {
        temp_dir: Some(temp.path().to_path_buf()),
        temp_max_age_hours: 0.000_001,
        ..EngineConfig::default()
    };
    let registry = SessionRegistry::new(config, Arc::new(drifting)).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(50));
    let summary = registry.cleanup().unwrap();
    assert!(summary.evicted.is_empty());
    assert_eq!(summary.stale_artifacts, 1);
    assert!(!temp.path().join("frame_0001.jpg").exists());
}
