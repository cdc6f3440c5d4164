//! Fuschia Runner
//!
//! Runs flows and prepares the data that flows through them:
//!
//! - coerces raw execution inputs against a flow's declared inputs, and raw
//!   outputs against its declared outputs ([`Runner::typed_inputs`],
//!   [`Runner::typed_outputs`])
//! - ingests multipart uploads into storage ([`Runner::upload_parts`])
//! - starts executions and waits for them on the execution queue
//!   ([`Runner::run_one`], [`Runner::await_execution`])

mod coerce;
mod condition;
mod config;
mod error;
mod factory;
mod nested;
mod parser;
pub mod predicate;
mod repository;
mod runner;
mod upload;
mod wait;

pub use coerce::RawValueMap;
pub use condition::{ConditionService, StateConditionService};
pub use config::{DEFAULT_TIMEOUT_MS, DEFAULT_UPLOAD_CONCURRENCY, RunnerConfig};
pub use error::RunnerError;
pub use factory::{InputsSupplier, new_execution};
pub use nested::nest;
pub use parser::TypedValueParser;
pub use repository::{FlowRepository, InMemoryFlowRepository};
pub use runner::{FlowTarget, RunOptions, Runner};
pub use upload::{UploadPart, purge_pending_uploads};
