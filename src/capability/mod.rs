//! Shared vocabulary for the effectful capabilities the agent loop drives.
//!
//! Both the execution port and the research port report failures through
//! [`CapabilityError`]. How a failure is handled depends on the port: research
//! failures are retried and degraded by the resilience layer, execution failures
//! of kind [`CapabilityErrorKind::FatalExecution`] stop the loop.

mod error;

pub use error::{CapabilityError, CapabilityErrorKind};
