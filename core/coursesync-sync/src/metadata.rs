//! Safe-metadata filter.
//!
//! Only content configuration may cross between nodes. A key passes when it
//! carries one of the application prefixes and matches none of the exclusion
//! patterns, which cover per-user state (quiz attempts, activity, progress,
//! completion, enrollment, access grants), editor locks and the sync engine's
//! own bookkeeping.

use coursesync_types::Metadata;

/// Key prefixes that mark content configuration.
pub const INCLUDE_PREFIXES: &[&str] = &[
    "_", "ld_", "course_", "lesson_", "topic_", "quiz_", "question_",
];

/// Substrings (matched case-insensitively) that disqualify a key.
pub const EXCLUDED_PATTERNS: &[&str] = &[
    // per-user learning state
    "quiz_attempt",
    "quizinfo",
    "activity",
    "progress",
    "completed",
    "completion",
    "enrolled",
    "enrollment",
    "enroll_",
    "access_list",
    "access_from",
    "access_expires",
    "user_",
    "_users",
    "score",
    // editor state
    "_edit_lock",
    "_edit_last",
    // sync bookkeeping
    "_ldmcs_",
    "_coursesync_",
    "ld_uuid",
    "last_sync",
];

/// Whether a single key may be exported or written.
pub fn is_safe_key(key: &str) -> bool {
    if !INCLUDE_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return false;
    }
    let lower = key.to_ascii_lowercase();
    !EXCLUDED_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Returns only the entries whose keys pass [`is_safe_key`].
pub fn safe_metadata(meta: &Metadata) -> Metadata {
    meta.iter()
        .filter(|(key, _)| is_safe_key(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
