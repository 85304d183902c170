//! Course structure maps.
//!
//! A course records which steps belong to it and how they nest:
//!
//! ```text
//! lessons:
//!   - key: lesson-a
//!     children:
//!       topics:  [topic-1, topic-2]
//!       quizzes: [quiz-x]
//! quizzes:
//!   - key: quiz-final
//! ```
//!
//! Keys are whatever identifiers the writing node used: stable ids, local ids,
//! or `<kind>:<id>` prefixed keys. The structure is stored in course metadata
//! under [`CourseStructure::META_KEY`].

use crate::{ContentKind, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered steps grouped by kind.
pub type StepSections = BTreeMap<ContentKind, Vec<StepEntry>>;

/// Key of a step inside a structure map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds a `<kind>:<id>` key.
    pub fn prefixed(kind: ContentKind, id: impl fmt::Display) -> Self {
        Self(format!("{}:{id}", kind.label()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind prefix, if the key carries one.
    pub fn prefix(&self) -> Option<ContentKind> {
        let (prefix, _) = self.0.split_once(':')?;
        prefix.parse().ok()
    }

    /// The identifier part of the key, without any kind prefix.
    pub fn id_part(&self) -> &str {
        match self.0.split_once(':') {
            Some((prefix, rest)) if prefix.parse::<ContentKind>().is_ok() => rest,
            _ => &self.0,
        }
    }

    /// Returns a key with the identifier replaced and the prefix preserved.
    pub fn with_id(&self, id: impl fmt::Display) -> Self {
        match self.prefix() {
            Some(kind) => Self::prefixed(kind, id),
            None => Self(id.to_string()),
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step in a structure map. A step without children is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntry {
    pub key: StepKey,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: StepSections,
}

impl StepEntry {
    pub fn leaf(key: impl Into<String>) -> Self {
        Self {
            key: StepKey::new(key),
            children: StepSections::new(),
        }
    }

    /// Appends a nested step under `kind`.
    pub fn with_child(mut self, kind: ContentKind, child: StepEntry) -> Self {
        self.children.entry(kind).or_default().push(child);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.children.values().all(Vec::is_empty)
    }

    /// Nested steps of one kind, in order.
    pub fn children_of(&self, kind: ContentKind) -> &[StepEntry] {
        self.children.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Hierarchical map of a course's steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseStructure(StepSections);

impl CourseStructure {
    /// Course metadata key holding the structure map.
    pub const META_KEY: &'static str = "ld_course_steps";
    /// Derived flat list of lesson ids.
    pub const LESSON_IDS_KEY: &'static str = "ld_course_lesson_ids";
    /// Derived flat list of quiz ids (course-level and lesson-level).
    pub const QUIZ_IDS_KEY: &'static str = "ld_course_quiz_ids";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: StepSections) -> Self {
        Self(sections)
    }

    /// Reads the structure out of course metadata. Returns `None` when the
    /// key is absent or does not hold a structure map.
    pub fn from_metadata(meta: &Metadata) -> Option<Self> {
        let value = meta.get(Self::META_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }

    /// Appends a top-level step.
    pub fn push(&mut self, kind: ContentKind, entry: StepEntry) {
        self.0.entry(kind).or_default().push(entry);
    }

    /// Top-level steps of one kind, in order.
    pub fn steps(&self, kind: ContentKind) -> &[StepEntry] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sections(&self) -> &StepSections {
        &self.0
    }

    pub fn into_sections(self) -> StepSections {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Every key in the map, depth first, paired with the kind it sits under.
    pub fn all_keys(&self) -> Vec<(ContentKind, &StepKey)> {
        fn walk<'a>(sections: &'a StepSections, out: &mut Vec<(ContentKind, &'a StepKey)>) {
            for (kind, entries) in sections {
                for entry in entries {
                    out.push((*kind, &entry.key));
                    walk(&entry.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.0, &mut out);
        out
    }

    /// Id parts of all lesson steps, in order.
    pub fn lesson_ids(&self) -> Vec<String> {
        self.steps(ContentKind::Lesson)
            .iter()
            .map(|e| e.key.id_part().to_string())
            .collect()
    }

    /// Id parts of all quiz steps (course-level first, then nested under
    /// lessons), without duplicates.
    pub fn quiz_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let nested = self
            .steps(ContentKind::Lesson)
            .iter()
            .flat_map(|lesson| lesson.children_of(ContentKind::Quiz));
        for entry in self.steps(ContentKind::Quiz).iter().chain(nested) {
            let id = entry.key.id_part().to_string();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}
