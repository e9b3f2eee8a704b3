#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for version store operations.
pub const TRACING_TARGET_STORE: &str = "processlab_session::store";

/// Tracing target for working-copy operations.
pub const TRACING_TARGET_SESSION: &str = "processlab_session::session";

/// Tracing target for natural-language edits.
pub const TRACING_TARGET_BRIDGE: &str = "processlab_session::bridge";

mod bridge;
mod context;
mod generation;
mod session;
mod store;
mod timeline;

#[cfg(test)]
mod test_support;

pub use bridge::{EditBridge, TranscriptEntry, TranscriptRole};
pub use context::SessionContext;
pub use session::{LoadError, ProcessSession};
pub use store::{LoadMode, VersionContent, VersionStore, XmlSource};
pub use timeline::{CompareOutcome, ComparePair, CompareRole, TimelineEntry, VersionTimeline};
