use coursesync_sync::{is_safe_key, safe_metadata};
use coursesync_types::Metadata;
use proptest::prelude::*;
use serde_json::json;

#[test]
fn configuration_keys_pass() {
    for key in [
        "_sfwd-courses",
        "_sfwd-quizzes",
        "ld_course_steps",
        "course_price",
        "lesson_materials",
        "quiz_pro_id",
        "question_points",
        "topic_video",
    ] {
        assert!(is_safe_key(key), "{key} should pass");
    }
}

#[test]
fn user_and_bookkeeping_keys_are_excluded() {
    for key in [
        "_progress_42",
        "_sfwd-course_progress",
        "course_42_access_from",
        "course_access_list",
        "_quiz_attempt_7",
        "ld_course_activity",
        "course_completed_9",
        "_edit_lock",
        "_ldmcs_master_id",
        "ld_uuid",
        "_ldmcs_last_sync",
    ] {
        assert!(!is_safe_key(key), "{key} should be excluded");
    }
}

#[test]
fn unprefixed_keys_are_excluded() {
    assert!(!is_safe_key("price"));
    assert!(!is_safe_key("sfwd-courses"));
}

#[test]
fn filter_keeps_values() {
    let mut meta = Metadata::new();
    meta.insert("course_price".into(), json!("10"));
    meta.insert("_progress_1".into(), json!(true));
    let safe = safe_metadata(&meta);
    assert_eq!(safe.len(), 1);
    assert_eq!(safe["course_price"], json!("10"));
}

proptest! {
    #[test]
    fn excluded_patterns_never_survive(
        prefix in prop::sample::select(vec!["_", "ld_", "course_", "quiz_"]),
        pattern in prop::sample::select(vec![
            "progress", "quiz_attempt", "enrolled", "completed", "access_expires", "activity",
        ]),
        user in 0u32..100_000,
        upper in any::<bool>(),
    ) {
        let raw = format!("{prefix}{pattern}_{user}");
        let key = if upper { raw.to_uppercase().replacen(&prefix.to_uppercase(), prefix, 1) } else { raw };
        let mut meta = Metadata::new();
        meta.insert(key.clone(), json!(user));
        meta.insert("course_price".into(), json!("0"));

        let safe = safe_metadata(&meta);
        prop_assert!(!safe.contains_key(&key));
        prop_assert!(safe.contains_key("course_price"));
    }
}
