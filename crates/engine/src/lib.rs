//! `engine` crate: node registry, node execution and the webhook lifecycle
//! driver.

pub mod activation;
pub mod error;
pub mod executor;
pub mod models;

pub use activation::{Activation, WebhookActivator};
pub use error::EngineError;
pub use executor::{ExecutionResult, NodeRegistry, WorkflowExecutor};
pub use models::{NodeDefinition, Workflow};

#[cfg(test)]
mod executor_tests;
