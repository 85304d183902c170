mod common;

use common::{insert, published, store};
use coursesync_store::NewContent;
use coursesync_sync::{BackfillReport, ensure_all, ensure_stable_id};
use coursesync_types::{ContentKind, StableId};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn existing_id_is_returned_unchanged() {
    let store = store();
    let fixed = StableId::new("already-here").unwrap();
    let id = insert(&store, NewContent::new(ContentKind::Course, "C", "c").stable_id(fixed.clone()));
    assert_eq!(ensure_stable_id(&store, id).unwrap(), fixed);
}

#[test]
fn missing_id_is_generated_once() {
    let store = store();
    let id = insert(&store, published(ContentKind::Lesson, "l"));
    let first = ensure_stable_id(&store, id).unwrap();
    assert!(first.is_uuid());
    assert_eq!(ensure_stable_id(&store, id).unwrap(), first);
    assert_eq!(store.require(id).unwrap().stable_id, Some(first));
}

#[test]
fn concurrent_callers_converge() {
    let store = store();
    let id = insert(&store, published(ContentKind::Quiz, "q"));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || ensure_stable_id(&store, id).unwrap())
        })
        .collect();
    let ids: Vec<StableId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn backfill_counts() {
    let store = store();
    insert(&store, published(ContentKind::Topic, "a"));
    insert(&store, published(ContentKind::Topic, "b"));
    insert(
        &store,
        published(ContentKind::Topic, "c").stable_id(StableId::generate()),
    );
    insert(&store, published(ContentKind::Lesson, "other-kind"));

    let report = ensure_all(&store, ContentKind::Topic).unwrap();
    assert_eq!(
        report,
        BackfillReport {
            total: 3,
            newly_assigned: 2,
            already_present: 1
        }
    );
    let again = ensure_all(&store, ContentKind::Topic).unwrap();
    assert_eq!(again.newly_assigned, 0);
    assert_eq!(again.already_present, 3);
}
