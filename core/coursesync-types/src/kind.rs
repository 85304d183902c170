//! Content kinds and lifecycle states.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of synchronizable content kinds.
///
/// On the wire a kind is its plural path segment (`courses`, `lessons`, ...).
/// Singular spellings are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "courses", alias = "course")]
    Course,
    #[serde(rename = "lessons", alias = "lesson")]
    Lesson,
    #[serde(rename = "topics", alias = "topic")]
    Topic,
    #[serde(rename = "quizzes", alias = "quiz")]
    Quiz,
    #[serde(rename = "questions", alias = "question")]
    Question,
}

impl ContentKind {
    /// All kinds in dependency order (parents before children).
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Course,
        ContentKind::Lesson,
        ContentKind::Topic,
        ContentKind::Quiz,
        ContentKind::Question,
    ];

    /// Plural form used in URLs, wire payloads and the store.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Course => "courses",
            Self::Lesson => "lessons",
            Self::Topic => "topics",
            Self::Quiz => "quizzes",
            Self::Question => "questions",
        }
    }

    /// Singular label, used as the prefix of nested structure keys.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Lesson => "lesson",
            Self::Topic => "topic",
            Self::Quiz => "quiz",
            Self::Question => "question",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for ContentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ContentKind::ALL
            .into_iter()
            .find(|k| k.path_segment() == normalized || k.label() == normalized)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Publication state of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Draft,
    Pending,
    Private,
    #[serde(alias = "future")]
    Scheduled,
    #[serde(alias = "publish")]
    Published,
}

impl LifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
        }
    }

    /// Parses a state reported by a peer. Unrecognized values fall back to
    /// `Draft`; receivers never trust the origin state anyway.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "auto-draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "private" => Ok(Self::Private),
            "scheduled" | "future" => Ok(Self::Scheduled),
            "published" | "publish" => Ok(Self::Published),
            other => Err(ValidationError::InvalidField {
                field: "status",
                reason: format!("unknown lifecycle state `{other}`"),
            }),
        }
    }
}
