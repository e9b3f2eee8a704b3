//! Convenient re-exports for common use.

pub use crate::bpmn::{BpmnDocument, Element, ElementType, Lane, SequenceFlow};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::process::Process;
pub use crate::version::{ChangeType, Version};
