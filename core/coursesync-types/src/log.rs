//! Audit log entries and client registrations.

use crate::ContentKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which flow produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Client pulled content from the master.
    Pull,
    /// Master pushed content to a client (or a client received a push).
    Push,
    /// A local edit on the master.
    Update,
}

impl SyncDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "update" => Ok(Self::Update),
            other => Err(format!("unknown sync direction `{other}`")),
        }
    }
}

/// Machine-readable outcome attached to log entries and item results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Success,
    Skipped,
    Error,
    Info,
    Debug,
}

impl SyncOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown sync outcome `{other}`")),
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub direction: SyncDirection,
    /// `None` for entries not tied to a single kind (e.g. a push to a site).
    pub content_kind: Option<ContentKind>,
    /// Stable id of the item, or `"0"` when there is none.
    pub content_ref: String,
    pub outcome: SyncOutcome,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn new(
        direction: SyncDirection,
        content_kind: Option<ContentKind>,
        content_ref: impl Into<String>,
        outcome: SyncOutcome,
        message: impl Into<String>,
    ) -> Self {
        let content_ref = content_ref.into();
        Self {
            direction,
            content_kind,
            content_ref: if content_ref.is_empty() { "0".into() } else { content_ref },
            outcome,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Derived activity status of a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Active,
    Inactive,
}

/// A receiving node known to the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub endpoint_url: String,
    pub display_name: String,
    /// Secret the master sends when pushing to this client. Never exposed
    /// through listings.
    #[serde(skip)]
    pub push_secret: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl ClientRegistration {
    /// Default age after which a client is reported inactive.
    pub const INACTIVE_AFTER_DAYS: i64 = 7;

    pub fn status_at(&self, now: DateTime<Utc>, threshold: Duration) -> RegistrationStatus {
        if now - self.last_seen_at > threshold {
            RegistrationStatus::Inactive
        } else {
            RegistrationStatus::Active
        }
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status_at(Utc::now(), Duration::days(Self::INACTIVE_AFTER_DAYS))
    }
}
