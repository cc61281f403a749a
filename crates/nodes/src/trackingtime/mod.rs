//! TrackingTime integration: the action node, the trigger node and the
//! pieces they share (credentials, request adapter, response handling).

pub mod config;
pub mod constants;
pub mod credentials;
pub mod load_options;
pub mod node;
pub mod request;
pub mod resource_mapping;
pub mod response;
pub mod time_entry;
pub mod transport;
pub mod trigger;

pub use config::{load_config, ConfigError, TrackingtimeConfig};
pub use credentials::Credentials;
pub use node::{TrackingtimeNode, NODE_TYPE};
pub use transport::ReqwestTransport;
pub use trigger::{DeletePolicy, TrackingtimeTrigger, TRIGGER_TYPE};
