//! `nodes` crate: the node traits and the built-in TrackingTime nodes.
//!
//! Action nodes implement [`ExecutableNode`], webhook-driven nodes implement
//! [`TriggerNode`]. The engine crate dispatches through these trait objects
//! and supplies the host services they depend on: an authenticated
//! [`RequestHelper`] and per-node [`StaticData`].

pub mod description;
pub mod error;
pub mod http;
pub mod mock;
pub mod static_data;
pub mod trackingtime;
pub mod traits;

pub use error::{ApiError, NodeError, OperationError};
pub use http::{HttpRequestOptions, RawResponse, RequestHelper};
pub use static_data::{InMemoryStaticDataStore, NodeKey, StaticData, StaticDataStore, StoreError};
pub use traits::{
    ExecutableNode, ExecutionContext, HookContext, Item, LoadOptionsContext, NodeParameters, TriggerNode,
    WebhookRequest,
};
