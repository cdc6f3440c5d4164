//! Fuschia Flow
//!
//! This crate provides the model shared by the runner: flow definitions with
//! their declared inputs and outputs, execution records, lifecycle states,
//! and the typed values that coercion produces.
//!
//! Flows are read-only. Executions are updated by replacement: every `with_*`
//! method consumes the execution and returns a new one.

mod data;
mod duration;
mod error;
mod execution;
mod flow;
mod state;
mod value;

pub use data::{Data, DataKind, DataType, Input, Output, ValidationError};
pub use duration::{ParseDurationError, format_iso_duration, parse_iso_duration};
pub use error::FlowError;
pub use execution::{Execution, TaskRun, new_id};
pub use flow::{Flow, Label};
pub use state::{State, StateHistory, StateType};
pub use value::{ENCRYPTED_STRING_TYPE, EncryptedString, TypedValue, TypedValueMap};
