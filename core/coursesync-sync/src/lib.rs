//! Content sync between a master node and its clients.
//!
//! - [`identity`]: stable id assignment and backfill
//! - [`metadata`]: the safe-metadata filter
//! - [`exporter`]: turns local records into ordered wire batches
//! - [`engine`]: applies incoming items (find-or-create, conflict policy)
//! - [`rebuild`]: remaps course structure maps after a batch
//! - [`protocol`] / [`transport`]: JSON wire types and HTTP clients
//! - [`pull`] / [`push`]: the two ways content moves
//! - [`notify`]: "content updated" notices for local edits

pub mod engine;
pub mod error;
pub mod exporter;
pub mod identity;
pub mod metadata;
pub mod notify;
pub mod protocol;
pub mod pull;
pub mod push;
pub mod rebuild;
pub mod transport;

pub use engine::{BatchContext, ConflictPolicy, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use exporter::Exporter;
pub use identity::{BackfillReport, ensure_all, ensure_stable_id};
pub use metadata::{is_safe_key, safe_metadata};
pub use notify::UpdateNotifier;
pub use protocol::{BatchSummary, ContentPage, ItemResult, PageRequest, ReceiveRequest, VerifyResponse};
pub use pull::{KindReport, PullReport, PullSync};
pub use push::{PushCoordinator, PushReport, SiteResult};
pub use rebuild::{OriginMap, RebuildReport, rebuild_structure};
pub use transport::{HttpMasterApi, HttpPushTransport, MasterApi, PushTarget, PushTransport};
