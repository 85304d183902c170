mod common;

use common::{insert, published, store};
use coursesync_store::NewContent;
use coursesync_sync::{OriginMap, RebuildReport, rebuild_structure};
use coursesync_types::{ContentKind, CourseStructure, LocalId, Metadata, StableId, StepEntry};
use pretty_assertions::assert_eq;
use serde_json::json;

fn with_structure(store: &coursesync_store::ContentStore, course: LocalId, s: &CourseStructure) {
    let mut meta = Metadata::new();
    meta.insert(CourseStructure::META_KEY.into(), s.to_value());
    store.set_metadata(course, &meta).unwrap();
}

fn stored(store: &coursesync_store::ContentStore, course: LocalId) -> CourseStructure {
    CourseStructure::from_metadata(&store.metadata(course).unwrap()).unwrap()
}

#[test]
fn keys_are_remapped_through_the_origin_map() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let lesson = insert(&store, published(ContentKind::Lesson, "l"));
    let topic = insert(&store, published(ContentKind::Topic, "t"));
    let quiz = insert(&store, published(ContentKind::Quiz, "q"));

    let mut origin = CourseStructure::new();
    origin.push(
        ContentKind::Lesson,
        StepEntry::leaf("lesson:501")
            .with_child(ContentKind::Topic, StepEntry::leaf("502"))
            .with_child(ContentKind::Quiz, StepEntry::leaf("503")),
    );
    origin.push(ContentKind::Quiz, StepEntry::leaf("503"));
    with_structure(&store, course, &origin);

    let mut map = OriginMap::new();
    map.insert("501", lesson);
    map.insert("502", topic);
    map.insert("503", quiz);

    let report = rebuild_structure(&store, course, &map).unwrap();
    assert_eq!(
        report,
        RebuildReport { course: Some(course), kept: 0, remapped: 4, dropped: 0 }
    );

    let rebuilt = stored(&store, course);
    let lesson_entry = &rebuilt.steps(ContentKind::Lesson)[0];
    assert_eq!(lesson_entry.key.as_str(), format!("lesson:{lesson}"));
    assert_eq!(lesson_entry.children_of(ContentKind::Topic)[0].key.as_str(), topic.to_string());
    assert_eq!(rebuilt.steps(ContentKind::Quiz)[0].key.as_str(), quiz.to_string());

    let meta = store.metadata(course).unwrap();
    assert_eq!(meta[CourseStructure::LESSON_IDS_KEY], json!([lesson.get()]));
    assert_eq!(meta[CourseStructure::QUIZ_IDS_KEY], json!([quiz.get()]));
}

#[test]
fn unresolved_keys_are_dropped_with_their_children() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let mut origin = CourseStructure::new();
    origin.push(
        ContentKind::Lesson,
        StepEntry::leaf("gone")
            .with_child(ContentKind::Topic, StepEntry::leaf("also-gone"))
            .with_child(ContentKind::Topic, StepEntry::leaf("still-gone")),
    );
    with_structure(&store, course, &origin);

    let report = rebuild_structure(&store, course, &OriginMap::new()).unwrap();
    assert_eq!(report.dropped, 3);
    assert!(stored(&store, course).is_empty());
    assert_eq!(store.metadata(course).unwrap()[CourseStructure::LESSON_IDS_KEY], json!([]));
}

#[test]
fn stored_stable_and_origin_ids_resolve_without_the_map() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let lesson = insert(
        &store,
        published(ContentKind::Lesson, "l").stable_id(StableId::new("lesson-uuid").unwrap()),
    );
    let mut quiz = NewContent::new(ContentKind::Quiz, "Q", "q");
    quiz.origin_id = Some(900);
    let quiz = insert(&store, quiz);

    let mut origin = CourseStructure::new();
    origin.push(ContentKind::Lesson, StepEntry::leaf("lesson-uuid"));
    origin.push(ContentKind::Quiz, StepEntry::leaf("quiz:900"));
    with_structure(&store, course, &origin);

    let report = rebuild_structure(&store, course, &OriginMap::new()).unwrap();
    assert_eq!((report.remapped, report.dropped), (2, 0));
    let rebuilt = stored(&store, course);
    assert_eq!(rebuilt.steps(ContentKind::Lesson)[0].key.as_str(), lesson.to_string());
    assert_eq!(rebuilt.steps(ContentKind::Quiz)[0].key.as_str(), format!("quiz:{quiz}"));
}

#[test]
fn wrong_kind_mapping_is_not_trusted() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let topic = insert(&store, published(ContentKind::Topic, "t"));
    let mut origin = CourseStructure::new();
    origin.push(ContentKind::Lesson, StepEntry::leaf("77"));
    with_structure(&store, course, &origin);

    let mut map = OriginMap::new();
    map.insert("77", topic);
    let report = rebuild_structure(&store, course, &map).unwrap();
    assert_eq!(report.dropped, 1);
}

#[test]
fn every_key_resolves_after_rebuild() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let lesson = insert(&store, published(ContentKind::Lesson, "l"));
    let mut origin = CourseStructure::new();
    origin.push(ContentKind::Lesson, StepEntry::leaf("10"));
    origin.push(ContentKind::Lesson, StepEntry::leaf("11"));
    origin.push(ContentKind::Quiz, StepEntry::leaf("12"));
    with_structure(&store, course, &origin);

    let mut map = OriginMap::new();
    map.insert("10", lesson);
    rebuild_structure(&store, course, &map).unwrap();

    for (kind, key) in stored(&store, course).all_keys() {
        let id: i64 = key.id_part().parse().unwrap();
        assert_eq!(store.require(LocalId::new(id)).unwrap().kind, kind);
        assert_ne!(key.id_part(), "11");
        assert_ne!(key.id_part(), "12");
    }
}

#[test]
fn course_without_structure_is_left_alone() {
    let store = store();
    let course = insert(&store, published(ContentKind::Course, "c"));
    let report = rebuild_structure(&store, course, &OriginMap::new()).unwrap();
    assert_eq!(report, RebuildReport { course: Some(course), ..Default::default() });
    assert!(store.metadata(course).unwrap().is_empty());
}
