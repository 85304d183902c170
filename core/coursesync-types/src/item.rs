//! Content items and their wire representation.
//!
//! [`ContentItem`] is the validated, typed form used inside the engine.
//! [`WireItem`] mirrors the JSON object exchanged between nodes, where every
//! field is optional; conversion between the two is where inbound payloads
//! get rejected.

use crate::{ContentKind, LifecycleState, StableId, ValidationError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Content configuration metadata (key → scalar or array).
pub type Metadata = Map<String, Value>;

/// Taxonomy name → ordered term slugs.
pub type TaxonomyTerms = BTreeMap<String, Vec<String>>;

/// One synchronizable unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireItem", into = "WireItem")]
pub struct ContentItem {
    pub stable_id: StableId,
    /// The origin node's local id, when the origin reports it.
    pub origin_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub slug: String,
    pub lifecycle_state: LifecycleState,
    pub ordering_key: i64,
    pub parent_ref: Option<StableId>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub taxonomy_terms: TaxonomyTerms,
    pub config_metadata: Metadata,
    pub featured_media_ref: Option<String>,
}

impl ContentItem {
    /// Creates an item with the required fields set and everything else empty.
    pub fn new(stable_id: StableId, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            stable_id,
            origin_id: None,
            title: title.into(),
            body: String::new(),
            summary: String::new(),
            slug: slug.into(),
            lifecycle_state: LifecycleState::Published,
            ordering_key: 0,
            parent_ref: None,
            created_at: None,
            modified_at: None,
            taxonomy_terms: TaxonomyTerms::new(),
            config_metadata: Metadata::new(),
            featured_media_ref: None,
        }
    }
}

/// The JSON shape of an item on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireItem {
    #[serde(default, deserialize_with = "loose_ref")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default, deserialize_with = "loose_ref")]
    pub parent: Option<String>,
    #[serde(default)]
    pub menu_order: Option<i64>,
    #[serde(default)]
    pub meta: Option<Metadata>,
    #[serde(default, deserialize_with = "loose_ref")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub taxonomies: Option<TaxonomyTerms>,
}

/// Accepts a string, a number, or null. `0`, `""` and null all mean "none",
/// matching how origins report an absent parent or media reference.
fn loose_ref<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s == "0" {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(None),
            _ => Ok(Some(n.to_string())),
        },
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

impl TryFrom<WireItem> for ContentItem {
    type Error = ValidationError;

    fn try_from(wire: WireItem) -> Result<Self, Self::Error> {
        let stable_id = StableId::new(required(wire.id, "id")?)?;
        let title = wire.title.unwrap_or_default();
        let slug = required(wire.slug, "slug")?;
        let parent_ref = wire.parent.map(StableId::new).transpose()?;

        Ok(Self {
            stable_id,
            origin_id: wire.origin_id,
            title,
            body: wire.content.unwrap_or_default(),
            summary: wire.excerpt.unwrap_or_default(),
            slug: slug.trim().to_string(),
            lifecycle_state: wire
                .status
                .as_deref()
                .map(LifecycleState::parse_lenient)
                .unwrap_or_default(),
            ordering_key: wire.menu_order.unwrap_or(0).saturating_abs(),
            parent_ref,
            created_at: wire.date,
            modified_at: wire.modified,
            taxonomy_terms: wire.taxonomies.unwrap_or_default(),
            config_metadata: wire.meta.unwrap_or_default(),
            featured_media_ref: wire.featured_image,
        })
    }
}

impl From<ContentItem> for WireItem {
    fn from(item: ContentItem) -> Self {
        Self {
            id: Some(item.stable_id.into_string()),
            origin_id: item.origin_id,
            title: Some(item.title),
            content: Some(item.body),
            excerpt: Some(item.summary),
            status: Some(item.lifecycle_state.as_str().to_string()),
            slug: Some(item.slug),
            date: item.created_at,
            modified: item.modified_at,
            parent: item.parent_ref.map(StableId::into_string),
            menu_order: Some(item.ordering_key),
            meta: Some(item.config_metadata),
            featured_image: item.featured_media_ref,
            taxonomies: Some(item.taxonomy_terms),
        }
    }
}

/// An unvalidated batch entry as it arrives over the wire.
///
/// Deserializing never fails: an entry that is not an object, or whose
/// `type` is not a string, comes through with whatever could be read so that
/// [`BatchItem::from_raw`] rejects it as a single item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawBatchItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl<'de> Deserialize<'de> for RawBatchItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(mut entry) = value else {
            return Ok(Self {
                kind: String::new(),
                data: Value::Null,
            });
        };
        let kind = match entry.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Ok(Self {
            kind,
            data: entry.remove("data").unwrap_or(Value::Null),
        })
    }
}

impl RawBatchItem {
    /// Best-effort extraction of the item's stable id, for error reporting on
    /// items that fail validation.
    pub fn stable_hint(&self) -> Option<String> {
        match self.data.get("id")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A validated batch entry: a content item tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub kind: ContentKind,
    pub item: ContentItem,
}

impl BatchItem {
    pub fn new(kind: ContentKind, item: ContentItem) -> Self {
        Self { kind, item }
    }

    /// Validates a raw entry. Unknown kinds and missing required fields are
    /// rejected here, before anything reaches storage.
    pub fn from_raw(raw: RawBatchItem) -> Result<Self, ValidationError> {
        let kind: ContentKind = raw.kind.parse()?;
        if !raw.data.is_object() {
            return Err(ValidationError::Malformed("item data must be an object".into()));
        }
        let wire: WireItem = serde_json::from_value(raw.data)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Ok(Self {
            kind,
            item: ContentItem::try_from(wire)?,
        })
    }

    pub fn into_raw(self) -> RawBatchItem {
        RawBatchItem {
            kind: self.kind.path_segment().to_string(),
            data: serde_json::to_value(WireItem::from(self.item)).unwrap_or(Value::Null),
        }
    }
}

impl Serialize for BatchItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BatchItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawBatchItem::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(serde::de::Error::custom)
    }
}
