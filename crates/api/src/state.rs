//! Shared state of the HTTP server.

use std::collections::HashMap;
use std::sync::Arc;

use engine::{WebhookActivator, Workflow};
use nodes::Item;
use tokio::sync::mpsc;

/// Where requests to one webhook path go.
#[derive(Clone)]
pub struct WebhookRoute {
    pub workflow: Arc<Workflow>,
    /// The trigger node inside `workflow`.
    pub node_id: String,
    /// Receives the items produced by each accepted request.
    pub sink: mpsc::Sender<Vec<Item>>,
}

#[derive(Clone)]
pub struct AppState {
    pub activator: Arc<WebhookActivator>,
    pub routes: Arc<HashMap<String, WebhookRoute>>,
}

impl AppState {
    pub fn new(activator: Arc<WebhookActivator>) -> Self {
        Self {
            activator,
            routes: Arc::new(HashMap::new()),
        }
    }

    /// Bind `path` to a trigger node. Call before the server starts.
    pub fn with_route(mut self, path: impl Into<String>, route: WebhookRoute) -> Self {
        Arc::make_mut(&mut self.routes).insert(path.into(), route);
        self
    }
}
