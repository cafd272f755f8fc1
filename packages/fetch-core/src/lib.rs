//! Core fetch cascade, pattern intelligence, change prediction and
//! workflow/skill engine behind the intelligent web-fetching service.
//! This crate is transport-agnostic; `fetch-server` wires it to HTTP.

pub mod change_predictor;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod ids;
pub mod optimizer;
pub mod pattern;
pub mod planner;
pub mod renderer;
pub mod selector;
pub mod skill;
pub mod stats;
pub mod stealth;
pub mod verifier;
pub mod walk;
pub mod webhook;
pub mod workflow;

pub use config::Config;
pub use error::{FetchError, InternalError};
pub use executor::{DecisionTrace, Executor, ExecutorDeps, ExecutorError, FetchResult};
pub use planner::{Plan, Planner};
