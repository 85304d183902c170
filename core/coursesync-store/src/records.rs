//! Row types for the content table.

use chrono::{DateTime, Utc};
use coursesync_types::{ContentKind, LifecycleState, LocalId, Metadata, StableId, TaxonomyTerms};

/// A content record as stored on this node.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub local_id: LocalId,
    pub kind: ContentKind,
    pub stable_id: Option<StableId>,
    /// Local id of the record on the node it was synced from.
    pub origin_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub slug: String,
    pub status: LifecycleState,
    pub ordering: i64,
    pub parent_id: Option<LocalId>,
    pub featured_media: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    pub fn is_published(&self) -> bool {
        self.status == LifecycleState::Published
    }
}

/// Values for a new record.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub slug: String,
    pub status: LifecycleState,
    pub ordering: i64,
    pub parent_id: Option<LocalId>,
    pub stable_id: Option<StableId>,
    pub origin_id: Option<i64>,
    pub featured_media: Option<String>,
    pub metadata: Metadata,
    pub terms: TaxonomyTerms,
    pub synced_at: Option<DateTime<Utc>>,
}

impl NewContent {
    /// A draft record with the given title and slug.
    pub fn new(kind: ContentKind, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: String::new(),
            summary: String::new(),
            slug: slug.into(),
            status: LifecycleState::Draft,
            ordering: 0,
            parent_id: None,
            stable_id: None,
            origin_id: None,
            featured_media: None,
            metadata: Metadata::new(),
            terms: TaxonomyTerms::new(),
            synced_at: None,
        }
    }

    pub fn status(mut self, status: LifecycleState) -> Self {
        self.status = status;
        self
    }

    pub fn ordering(mut self, ordering: i64) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn parent(mut self, parent: LocalId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn stable_id(mut self, id: StableId) -> Self {
        self.stable_id = Some(id);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn terms(mut self, taxonomy: impl Into<String>, terms: Vec<String>) -> Self {
        self.terms.insert(taxonomy.into(), terms);
        self
    }
}

/// In-place overwrite of an existing record.
///
/// Metadata keys are upserted (keys not present are left untouched) and
/// taxonomy assignments are replaced per taxonomy present in `terms`.
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub title: String,
    pub body: String,
    pub summary: String,
    pub slug: String,
    pub ordering: i64,
    /// Replaces the stored stable id when set.
    pub stable_id: Option<StableId>,
    /// Replaces the stored origin id when set.
    pub origin_id: Option<i64>,
    pub featured_media: Option<String>,
    pub metadata: Metadata,
    pub terms: TaxonomyTerms,
    pub synced_at: Option<DateTime<Utc>>,
}
