use coursesync_types::{
    BatchItem, ContentItem, ContentKind, LifecycleState, RawBatchItem, StableId, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn raw(kind: &str, data: serde_json::Value) -> RawBatchItem {
    RawBatchItem {
        kind: kind.to_string(),
        data,
    }
}

fn full_wire() -> serde_json::Value {
    json!({
        "id": "7b0c8f5e-2a3d-4b7e-9c1a-000000000001",
        "origin_id": 12,
        "title": "Intro to Grammar",
        "content": "<p>Body</p>",
        "excerpt": "Short",
        "status": "draft",
        "slug": "intro-to-grammar",
        "date": "2024-01-01 10:00:00",
        "modified": "2024-02-01 10:00:00",
        "parent": 0,
        "menu_order": 3,
        "meta": { "_sfwd-courses": { "price_type": "open" } },
        "featured_image": 0,
        "taxonomies": { "ld_course_category": ["grammar", "beginner"] }
    })
}

// ── Validation ───────────────────────────────────────────────────

#[test]
fn full_item_validates() {
    let item = BatchItem::from_raw(raw("courses", full_wire())).unwrap();
    assert_eq!(item.kind, ContentKind::Course);
    assert_eq!(item.item.title, "Intro to Grammar");
    assert_eq!(item.item.body, "<p>Body</p>");
    assert_eq!(item.item.summary, "Short");
    assert_eq!(item.item.origin_id, Some(12));
    assert_eq!(item.item.ordering_key, 3);
    assert_eq!(item.item.lifecycle_state, LifecycleState::Draft);
    assert!(item.item.parent_ref.is_none());
    assert!(item.item.featured_media_ref.is_none());
    assert_eq!(
        item.item.taxonomy_terms["ld_course_category"],
        vec!["grammar".to_string(), "beginner".to_string()]
    );
}

#[test]
fn missing_slug_is_rejected() {
    let mut data = full_wire();
    data.as_object_mut().unwrap().remove("slug");
    assert_eq!(
        BatchItem::from_raw(raw("quizzes", data)),
        Err(ValidationError::MissingField("slug"))
    );
}

#[test]
fn untitled_items_are_accepted() {
    let mut data = full_wire();
    data.as_object_mut().unwrap().remove("title");
    let item = BatchItem::from_raw(raw("questions", data)).unwrap();
    assert_eq!(item.kind, ContentKind::Question);
    assert_eq!(item.item.title, "");

    let mut data = full_wire();
    data["title"] = json!("");
    assert_eq!(BatchItem::from_raw(raw("lessons", data)).unwrap().item.title, "");
}

#[test]
fn negative_menu_order_takes_its_magnitude() {
    let mut data = full_wire();
    data["menu_order"] = json!(-4);
    assert_eq!(BatchItem::from_raw(raw("lessons", data)).unwrap().item.ordering_key, 4);

    let mut data = full_wire();
    data.as_object_mut().unwrap().remove("menu_order");
    assert_eq!(BatchItem::from_raw(raw("lessons", data)).unwrap().item.ordering_key, 0);
}

#[test]
fn missing_id_is_rejected() {
    let mut data = full_wire();
    data.as_object_mut().unwrap().remove("id");
    assert_eq!(
        BatchItem::from_raw(raw("topics", data)),
        Err(ValidationError::MissingField("id"))
    );
}

#[test]
fn unknown_kind_is_rejected() {
    assert_eq!(
        BatchItem::from_raw(raw("badges", full_wire())),
        Err(ValidationError::UnknownKind("badges".into()))
    );
}

#[test]
fn non_object_data_is_malformed() {
    assert!(matches!(
        BatchItem::from_raw(raw("courses", json!([1, 2]))),
        Err(ValidationError::Malformed(_))
    ));
}

#[test]
fn numeric_id_and_parent_are_accepted() {
    let data = json!({ "id": 42, "title": "Q", "slug": "q", "parent": 41 });
    let item = BatchItem::from_raw(raw("question", data)).unwrap();
    assert_eq!(item.item.stable_id.as_str(), "42");
    assert_eq!(item.item.parent_ref.unwrap().as_str(), "41");
}

#[test]
fn stable_hint_reads_id_even_when_invalid() {
    let r = raw("quizzes", json!({ "id": "abc" }));
    assert_eq!(r.stable_hint().as_deref(), Some("abc"));
    assert!(BatchItem::from_raw(r).is_err());
}

// ── Wire form ────────────────────────────────────────────────────

#[test]
fn batch_item_serializes_as_type_and_data() {
    let mut item = ContentItem::new(StableId::generate(), "Lesson 1", "lesson-1");
    item.parent_ref = Some(StableId::new("parent-uuid").unwrap());
    let batch = BatchItem::new(ContentKind::Lesson, item.clone());

    let value = serde_json::to_value(&batch).unwrap();
    assert_eq!(value["type"], "lessons");
    assert_eq!(value["data"]["title"], "Lesson 1");
    assert_eq!(value["data"]["content"], "");
    assert_eq!(value["data"]["parent"], "parent-uuid");
    assert_eq!(value["data"]["status"], "published");

    let back: BatchItem = serde_json::from_value(value).unwrap();
    assert_eq!(back.item, item);
}

#[test]
fn malformed_entries_still_deserialize_as_raw_items() {
    let entries: Vec<RawBatchItem> = serde_json::from_value(json!([
        { "type": "courses", "data": { "id": "c-1" } },
        { "type": 5, "data": {} },
        { "data": { "id": "x-1" } },
        "oops",
        { "type": "lessons" }
    ]))
    .unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].kind, "courses");
    assert_eq!(entries[1].kind, "5");
    assert_eq!(entries[2].kind, "");
    assert_eq!(entries[2].stable_hint().as_deref(), Some("x-1"));
    assert_eq!(entries[3], raw("", serde_json::Value::Null));
    assert_eq!(entries[4].data, serde_json::Value::Null);

    assert_eq!(
        BatchItem::from_raw(entries[1].clone()),
        Err(ValidationError::UnknownKind("5".into()))
    );
    assert!(BatchItem::from_raw(entries[3].clone()).is_err());
    assert!(matches!(
        BatchItem::from_raw(entries[4].clone()),
        Err(ValidationError::Malformed(_))
    ));
}
