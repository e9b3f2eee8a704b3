#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for BPMN document operations.
pub const TRACING_TARGET_BPMN: &str = "processlab_core::bpmn";

mod error;
mod process;
mod version;

pub mod bpmn;
pub mod prelude;

pub use error::{BoxedError, Error, ErrorKind, Result};
pub use process::Process;
pub use version::{ChangeType, Version};
