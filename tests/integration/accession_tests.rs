//! End-to-end accession over real on-disk filesets.

use bin_atlas::accession::{CancellationToken, Control, SyncOptions};
use bin_atlas::store::Store;

use super::test_utils::{
    dashboard, sync, write_empty_capture, write_healthy, write_malformed, Scratch, DATASET,
};

const B1: &str = "D20190102T093000_IFCB927";
const B2: &str = "D20190102T100000_IFCB927";
const B3: &str = "D20190102T110000_IFCB927";

#[test]
fn three_record_scenario() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 100, 4, 4);
    write_empty_capture(&scratch.root, B2);
    write_malformed(&scratch.root, B3);

    let dashboard = dashboard(&scratch.db, &scratch.root);
    let summary = sync(&dashboard);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.bad, 1);
    assert_eq!(summary.existing, 1);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.last_pid.as_deref(), Some(B3));

    let store = dashboard.store();
    // B1: committed, in the dataset, metrics extracted
    let b1 = store.get_sample(B1).unwrap().unwrap();
    assert!(!b1.skip && !b1.qc_bad && !b1.qc_no_rois);
    assert_eq!(b1.n_images, 100);
    assert_eq!(b1.n_triggers, 100);
    assert_eq!(b1.ml_analyzed, Some(5.0));
    assert_eq!(b1.concentration, Some(20.0));
    assert_eq!(b1.temperature, Some(31.5));
    assert_eq!(b1.instrument, 927);
    assert!(b1.metadata.contains("softwareVersion"));
    assert_eq!(
        store.dataset_members(DATASET).unwrap(),
        vec![B1.to_string()]
    );

    // B2: committed as an empty capture, outside the dataset
    let b2 = store.get_sample(B2).unwrap().unwrap();
    assert!(!b2.skip && b2.qc_no_rois);
    assert_eq!(b2.n_images, 0);
    assert_eq!(b2.concentration, Some(0.0));

    // B3: deleted, not present in storage afterward
    assert!(store.get_sample(B3).unwrap().is_none());
    assert_eq!(store.sample_count().unwrap(), 2);

    // the instrument was auto-registered with its schema version
    let instrument = store.get_instrument(927).unwrap().unwrap();
    assert_eq!(instrument.version, 2);
}

#[test]
fn resync_in_a_new_process_is_idempotent() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 10, 4, 4);
    write_empty_capture(&scratch.root, B2);
    write_malformed(&scratch.root, B3);

    let first = sync(&dashboard(&scratch.db, &scratch.root));
    assert_eq!(first.added, 1);

    // a fresh dashboard over the same catalog file
    let second = sync(&dashboard(&scratch.db, &scratch.root));
    assert_eq!(second.added, 0);
    assert_eq!(second.existing, first.added + first.existing);
    assert_eq!(second.bad, 1);
}

#[test]
fn newest_only_skips_history() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B2, 5, 4, 4);
    sync(&dashboard(&scratch.db, &scratch.root));

    // one older and one newer fileset appear
    write_healthy(&scratch.root, B1, 5, 4, 4);
    write_healthy(&scratch.root, B3, 5, 4, 4);

    let dashboard = dashboard(&scratch.db, &scratch.root);
    let summary = dashboard
        .sync(
            DATASET,
            SyncOptions {
                newest_only: true,
                ..SyncOptions::default()
            },
            &mut |_| Control::Continue,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.added, 1);
    assert!(dashboard.store().get_sample(B1).unwrap().is_none());
    assert!(dashboard.store().get_sample(B3).unwrap().is_some());
}

#[test]
fn blacklisted_directories_are_pruned() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root.join("day1"), B1, 5, 4, 4);
    write_healthy(&scratch.root.join("bad"), B2, 5, 4, 4);
    write_healthy(&scratch.root.join("skip"), B3, 5, 4, 4);

    let summary = sync(&dashboard(&scratch.db, &scratch.root));
    assert_eq!(summary.total, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.last_pid.as_deref(), Some(B1));
}

#[test]
fn batch_boundaries_persist_on_cancellation() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 5, 4, 4);
    write_healthy(&scratch.root, B2, 5, 4, 4);
    write_healthy(&scratch.root, B3, 5, 4, 4);

    let dashboard = dashboard(&scratch.db, &scratch.root);
    let summary = dashboard
        .sync(
            DATASET,
            SyncOptions {
                batch_size: 1,
                ..SyncOptions::default()
            },
            &mut |_| Control::Cancel,
            &CancellationToken::new(),
        )
        .unwrap();

    // one batch committed before the cancel took effect
    assert_eq!(summary.total, 1);
    assert!(dashboard.store().get_sample(B1).unwrap().is_some());
    assert!(dashboard.store().get_sample(B2).unwrap().is_none());

    // the remainder arrives on the next sync
    let rest = sync(&dashboard);
    assert_eq!(rest.added, 2);
    assert_eq!(rest.existing, 1);
}

#[test]
fn sync_one_ingests_a_single_fileset() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 5, 4, 4);
    write_malformed(&scratch.root, B3);

    let dashboard = dashboard(&scratch.db, &scratch.root);
    assert_eq!(
        dashboard.sync_one(DATASET, B1).unwrap(),
        bin_atlas::accession::SyncOutcome::Added
    );
    assert!(dashboard.sync_one(DATASET, B3).is_err());
    assert!(dashboard.sync_one(DATASET, B2).is_err());
    assert_eq!(dashboard.store().sample_count().unwrap(), 1);
}
