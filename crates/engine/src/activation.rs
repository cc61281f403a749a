//! Webhook lifecycle driver.
//!
//! Calls the trigger callbacks in the order the host contract defines and
//! owns the node's static data around each call: it is loaded before the
//! callback and saved after it, whether the callback succeeded or not, so a
//! cleared registration never comes back.

use std::sync::Arc;

use nodes::{
    HookContext, Item, NodeError, NodeKey, NodeParameters, RequestHelper, StaticDataStore, TriggerNode,
    WebhookRequest,
};
use tracing::{info, instrument, warn};

use crate::{EngineError, NodeDefinition, NodeRegistry, Workflow};

/// What `activate` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The stored registration is still known remotely.
    AlreadyRegistered,
    /// A new webhook was registered.
    Created,
}

pub struct WebhookActivator {
    registry: Arc<NodeRegistry>,
    helper: Arc<dyn RequestHelper>,
    store: Arc<dyn StaticDataStore>,
}

impl WebhookActivator {
    pub fn new(registry: Arc<NodeRegistry>, helper: Arc<dyn RequestHelper>, store: Arc<dyn StaticDataStore>) -> Self {
        Self { registry, helper, store }
    }

    fn resolve<'w>(
        &self,
        workflow: &'w Workflow,
        node_id: &str,
    ) -> Result<(&'w NodeDefinition, Arc<dyn TriggerNode>), EngineError> {
        let node_def = workflow
            .node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;
        let trigger = self.registry.trigger(&node_def.node_type)?;
        Ok((node_def, trigger))
    }

    async fn hook_context(
        &self,
        workflow: &Workflow,
        node_def: &NodeDefinition,
        webhook_url: &str,
    ) -> Result<HookContext, EngineError> {
        let static_data = self.store.load(&key(workflow, node_def)).await?;
        Ok(HookContext {
            workflow_id: workflow.id,
            node_id: node_def.id.clone(),
            parameters: NodeParameters::from_value(node_def.parameters.clone()),
            webhook_url: webhook_url.to_owned(),
            static_data,
            helper: self.helper.clone(),
        })
    }

    async fn persist<T>(
        &self,
        workflow: &Workflow,
        node_def: &NodeDefinition,
        ctx: &HookContext,
        outcome: Result<T, NodeError>,
    ) -> Result<T, EngineError> {
        let saved = self.store.save(&key(workflow, node_def), &ctx.static_data).await;
        match outcome {
            Ok(value) => {
                saved?;
                Ok(value)
            }
            Err(err) => {
                if let Err(save_err) = saved {
                    warn!("node '{}' static data was not saved: {}", node_def.id, save_err);
                }
                Err(EngineError::node_failed(&node_def.id, err))
            }
        }
    }

    /// Make sure the trigger's webhook is registered: `check_exists`, then
    /// `create` if it is not.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn activate(
        &self,
        workflow: &Workflow,
        node_id: &str,
        webhook_url: &str,
    ) -> Result<Activation, EngineError> {
        let (node_def, trigger) = self.resolve(workflow, node_id)?;
        let mut ctx = self.hook_context(workflow, node_def, webhook_url).await?;

        let outcome = register(trigger.as_ref(), &mut ctx).await;
        let activation = self
            .persist(workflow, node_def, &ctx, outcome)
            .await?
            .ok_or_else(|| EngineError::WebhookNotCreated(node_id.to_owned()))?;

        info!("node '{}' activated: {:?}", node_id, activation);
        Ok(activation)
    }

    /// Unregister the trigger's webhook. Returns the trigger's verdict.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn deactivate(&self, workflow: &Workflow, node_id: &str, webhook_url: &str) -> Result<bool, EngineError> {
        let (node_def, trigger) = self.resolve(workflow, node_id)?;
        let mut ctx = self.hook_context(workflow, node_def, webhook_url).await?;

        let outcome = trigger.delete(&mut ctx).await;
        let deleted = self.persist(workflow, node_def, &ctx, outcome).await?;

        if deleted {
            info!("node '{}' deactivated", node_id);
        } else {
            warn!("node '{}' could not remove its webhook", node_id);
        }
        Ok(deleted)
    }

    /// Whether the stored registration is still known remotely.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn check(&self, workflow: &Workflow, node_id: &str, webhook_url: &str) -> Result<bool, EngineError> {
        let (node_def, trigger) = self.resolve(workflow, node_id)?;
        let mut ctx = self.hook_context(workflow, node_def, webhook_url).await?;

        let outcome = trigger.check_exists(&mut ctx).await;
        self.persist(workflow, node_def, &ctx, outcome).await
    }

    /// Turn an inbound request into the trigger's output items.
    pub async fn dispatch(
        &self,
        workflow: &Workflow,
        node_id: &str,
        request: WebhookRequest,
    ) -> Result<Vec<Item>, EngineError> {
        let (node_def, trigger) = self.resolve(workflow, node_id)?;
        trigger
            .webhook(request)
            .await
            .map_err(|e| EngineError::node_failed(&node_def.id, e))
    }
}

/// `check_exists`, then `create` when needed. `None` when `create` declined.
async fn register(trigger: &dyn TriggerNode, ctx: &mut HookContext) -> Result<Option<Activation>, NodeError> {
    if trigger.check_exists(ctx).await? {
        return Ok(Some(Activation::AlreadyRegistered));
    }
    Ok(trigger.create(ctx).await?.then_some(Activation::Created))
}

fn key(workflow: &Workflow, node_def: &NodeDefinition) -> NodeKey {
    NodeKey::new(workflow.id, node_def.id.clone())
}
