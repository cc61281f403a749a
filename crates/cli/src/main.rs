//! `trackingtime-node` CLI entry-point.
//!
//! Available sub-commands:
//! - `describe`: print the node, trigger and credential descriptions.
//! - `test-credentials`: check the configured credentials.
//! - `accounts`: list the accounts the credentials can use.
//! - `search-fields`: list the time-entry search filters of a criteria.
//! - `run`: run the TrackingTime node over input items.
//! - `webhook`: activate, deactivate or check the trigger webhook.
//! - `serve`: register the trigger webhook and receive events.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use api::{AppState, WebhookRoute};
use clap::{Args, Parser, Subcommand};
use db::SqliteStaticDataStore;
use engine::{NodeDefinition, NodeRegistry, WebhookActivator, Workflow, WorkflowExecutor};
use nodes::trackingtime::config::DEFAULT_CONFIG_FILE;
use nodes::trackingtime::credentials::credential_types;
use nodes::trackingtime::{load_config, ReqwestTransport, NODE_TYPE, TRIGGER_TYPE};
use nodes::traits::json_array;
use nodes::{ExecutableNode, Item, RequestHelper, TriggerNode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "trackingtime-node",
    about = "TrackingTime time entries and webhooks as workflow steps",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Database holding webhook registrations.
    #[arg(long, global = true, env = "DATABASE_URL", default_value = "sqlite://trackingtime.db")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the node, trigger and credential type descriptions as JSON.
    Describe,
    /// Run the credential test request.
    TestCredentials,
    /// Print the accounts available to the credentials.
    Accounts,
    /// Print the search filters for a search criteria.
    SearchFields {
        #[arg(long)]
        criteria: String,
    },
    /// Run the TrackingTime node and print its output items.
    Run {
        /// JSON file with the node parameters.
        #[arg(long)]
        parameters: PathBuf,
        /// JSON file with the input items (an array or a single object).
        #[arg(long)]
        input: Option<PathBuf>,
        /// Record item failures as output instead of stopping.
        #[arg(long)]
        continue_on_fail: bool,
    },
    /// Manage the trigger webhook registration.
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// Register the trigger webhook, print received items as JSON lines, and
    /// unregister on Ctrl-C.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        #[arg(long)]
        account: String,
        /// Externally reachable base URL of this server.
        #[arg(long)]
        public_url: String,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    Activate(WebhookArgs),
    Deactivate(WebhookArgs),
    Check(WebhookArgs),
}

#[derive(Args)]
struct WebhookArgs {
    #[arg(long)]
    account: String,
    /// Callback URL registered with TrackingTime.
    #[arg(long)]
    url: String,
}

/// Everything built from the configuration file.
struct Runtime {
    base_url: String,
    registry: Arc<NodeRegistry>,
    transport: Arc<ReqwestTransport>,
}

impl Runtime {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let config = load_config(path)?.with_env_credentials();
        let base_url = config.base_url.clone();
        let registry = NodeRegistry::trackingtime(&base_url, config.only_active_accounts, config.delete_policy);
        let transport = config.into_transport()?;

        Ok(Self {
            base_url,
            registry: Arc::new(registry),
            transport: Arc::new(transport),
        })
    }

    fn helper(&self) -> Arc<dyn RequestHelper> {
        self.transport.clone()
    }

    fn executor(&self) -> WorkflowExecutor {
        WorkflowExecutor::new(self.registry.clone(), self.helper())
    }

    async fn activator(&self, database_url: &str) -> anyhow::Result<WebhookActivator> {
        let pool = db::create_pool(database_url, 5)
            .await
            .with_context(|| format!("failed to open {database_url}"))?;
        db::run_migrations(&pool).await?;
        let store = Arc::new(SqliteStaticDataStore::new(pool));
        Ok(WebhookActivator::new(self.registry.clone(), self.helper(), store))
    }
}

/// The single-trigger workflow for an account and callback URL. Its id is
/// derived from both so repeated invocations share static data.
fn trigger_workflow(account: &str, url: &str) -> Workflow {
    let mut workflow = Workflow::new(
        "trackingtime-trigger",
        vec![NodeDefinition::new(
            TRIGGER_TYPE,
            TRIGGER_TYPE,
            json!({ "accountId": account, "topic": "time-entries" }),
        )],
    );
    workflow.id = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{account}|{url}").as_bytes());
    workflow
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = Runtime::load(&cli.config)?;

    match cli.command {
        Command::Describe => {
            let node = runtime.registry.action(NODE_TYPE)?;
            let trigger = runtime.registry.trigger(TRIGGER_TYPE)?;
            print_json(&json!({
                "nodes": [node.description(), trigger.description()],
                "credentials": credential_types(&runtime.base_url),
            }))?;
        }
        Command::TestCredentials => {
            runtime.transport.test_credentials(&runtime.base_url).await?;
            info!("Credentials are valid");
        }
        Command::Accounts => {
            let options = runtime.executor().load_options(NODE_TYPE, "getAccounts", json!({})).await?;
            print_json(&options)?;
        }
        Command::SearchFields { criteria } => {
            let fields = runtime
                .executor()
                .resource_mapping(NODE_TYPE, "getTimeEntrySearchFields", json!({ "selectCriteria": criteria }))
                .await?;
            print_json(&fields)?;
        }
        Command::Run {
            parameters,
            input,
            continue_on_fail,
        } => {
            let parameters = read_json(&parameters)?;
            if !parameters.is_object() {
                bail!("node parameters must be a JSON object");
            }
            let items: Vec<Item> = match input {
                Some(path) => json_array(read_json(&path)?).into_iter().map(Item::new).collect(),
                None => vec![Item::new(json!({}))],
            };

            let workflow = Workflow::new(
                "trackingtime-run",
                vec![NodeDefinition::new(NODE_TYPE, NODE_TYPE, parameters).continue_on_fail(continue_on_fail)],
            );
            let result = runtime.executor().run_node(&workflow, NODE_TYPE, items).await?;
            info!("Execution {} produced {} items", result.execution_id, result.items.len());
            print_json(&result.items)?;
        }
        Command::Webhook { action } => {
            let activator = runtime.activator(&cli.database_url).await?;
            match action {
                WebhookAction::Activate(args) => {
                    let workflow = trigger_workflow(&args.account, &args.url);
                    let activation = activator.activate(&workflow, TRIGGER_TYPE, &args.url).await?;
                    info!("Webhook active ({activation:?})");
                }
                WebhookAction::Deactivate(args) => {
                    let workflow = trigger_workflow(&args.account, &args.url);
                    let deleted = activator.deactivate(&workflow, TRIGGER_TYPE, &args.url).await?;
                    info!("Webhook removed: {deleted}");
                }
                WebhookAction::Check(args) => {
                    let workflow = trigger_workflow(&args.account, &args.url);
                    let exists = activator.check(&workflow, TRIGGER_TYPE, &args.url).await?;
                    print_json(&json!({ "exists": exists }))?;
                }
            }
        }
        Command::Serve {
            bind,
            account,
            public_url,
        } => {
            let activator = Arc::new(runtime.activator(&cli.database_url).await?);

            let path = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{account}|{public_url}").as_bytes())
                .simple()
                .to_string();
            let webhook_url = format!("{}/webhook/{path}", public_url.trim_end_matches('/'));
            let workflow = Arc::new(trigger_workflow(&account, &webhook_url));

            let activation = activator.activate(&workflow, TRIGGER_TYPE, &webhook_url).await?;
            info!("Webhook {webhook_url} active ({activation:?})");

            let (sink, mut received) = mpsc::channel::<Vec<Item>>(64);
            let printer = tokio::spawn(async move {
                while let Some(items) = received.recv().await {
                    for item in items {
                        println!("{}", item.json);
                    }
                }
            });

            let state = AppState::new(activator.clone()).with_route(
                path,
                WebhookRoute {
                    workflow: workflow.clone(),
                    node_id: TRIGGER_TYPE.to_owned(),
                    sink,
                },
            );
            api::serve(bind, state, async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            })
            .await?;

            let deleted = activator.deactivate(&workflow, TRIGGER_TYPE, &webhook_url).await?;
            info!("Webhook removed: {deleted}");
            printer.abort();
        }
    }

    Ok(())
}
