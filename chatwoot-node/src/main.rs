use anyhow::{Context, Result};
use chatwoot_node::{
    config::Config,
    error::NodeError,
    params::Params,
    search::ListSearch,
    server,
    trigger::{FileStore, WebhookSettings, WebhookTrigger},
    ChatwootClient, ChatwootNode, Operation, Transport,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "chatwoot-node", version)]
#[command(about = "Chatwoot workflow operations and webhook trigger", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "chatwoot-node.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one operation over a batch of input items
    Run {
        /// Resource name, e.g. contact
        #[arg(long)]
        resource: String,

        /// Operation name, e.g. create
        #[arg(long)]
        operation: String,

        /// JSON file with one parameter object or an array of them
        #[arg(long)]
        items: Option<PathBuf>,

        /// Record API failures as error items instead of aborting
        #[arg(long, default_value = "false")]
        continue_on_failure: bool,
    },
    /// Query a selection list (accounts, inboxes, contacts, ...)
    Search {
        /// List name, e.g. kanbanBoards
        #[arg(long)]
        provider: String,

        /// Case-insensitive substring filter
        #[arg(long)]
        filter: Option<String>,

        /// Page to fetch, as returned by a previous search
        #[arg(long)]
        pagination_token: Option<String>,
    },
    /// Manage the webhook trigger
    Trigger {
        #[command(subcommand)]
        action: TriggerCommand,
    },
}

#[derive(Subcommand)]
enum TriggerCommand {
    /// Register the webhook and print delivered events until Ctrl-C
    Serve,
    /// Remove the registered webhook
    Deactivate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let client: Arc<dyn Transport> = Arc::new(ChatwootClient::from_credentials(&config.credentials)?);

    match cli.command {
        Commands::Run {
            resource,
            operation,
            items,
            continue_on_failure,
        } => run_operation(config, client, &resource, &operation, items.as_deref(), continue_on_failure).await,
        Commands::Search {
            provider,
            filter,
            pagination_token,
        } => {
            let result = ListSearch::parse(&provider)?
                .search(
                    client.as_ref(),
                    config.credentials.account_id,
                    filter.as_deref(),
                    pagination_token.as_deref(),
                )
                .await?;
            print_json(&serde_json::to_value(result)?)
        }
        Commands::Trigger { action } => {
            let trigger = Arc::new(build_trigger(&config, client)?);
            match action {
                TriggerCommand::Serve => serve_trigger(&config, trigger).await,
                TriggerCommand::Deactivate => {
                    if trigger.delete().await? {
                        info!("Webhook '{}' deactivated", trigger.settings().webhook_name());
                    } else {
                        info!("No webhook registered for '{}'", trigger.settings().webhook_name());
                    }
                    Ok(())
                }
            }
        }
    }
}

async fn run_operation(
    config: Config,
    client: Arc<dyn Transport>,
    resource: &str,
    operation: &str,
    items: Option<&Path>,
    continue_on_failure: bool,
) -> Result<()> {
    let operation = Operation::parse(resource, operation)?;
    let items = match items {
        Some(path) => load_items(path)?,
        None => Vec::new(),
    };

    let node = ChatwootNode::new(client, config.credentials.account_id, config.polling);
    let output = node.execute(operation, items, continue_on_failure).await?;
    print_json(&serde_json::to_value(output)?)
}

fn load_items(path: &Path) -> Result<Vec<Params>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read items file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse items file: {}", path.display()))?;
    match value {
        Value::Array(items) => items.into_iter().map(Params::from_value).collect(),
        other => Ok(vec![Params::from_value(other)?]),
    }
}

fn build_trigger(config: &Config, client: Arc<dyn Transport>) -> Result<WebhookTrigger> {
    let trigger_config = config.trigger()?;
    let account_id = config.credentials.account_id.ok_or_else(|| {
        NodeError::configuration("The trigger needs credentials.account_id")
    })?;
    let settings = WebhookSettings::from_config(trigger_config)?;
    let store = Arc::new(FileStore::new(&trigger_config.store_path));

    Ok(WebhookTrigger::new(
        client,
        store,
        account_id.to_string(),
        settings.webhook_name(),
        settings,
    ))
}

async fn serve_trigger(config: &Config, trigger: Arc<WebhookTrigger>) -> Result<()> {
    let trigger_config = config.trigger()?;
    let webhook_id = trigger.activate().await?;
    info!(
        "Webhook {} active for {}",
        webhook_id,
        trigger.settings().callback_url
    );

    let (tx, rx) = mpsc::channel::<Value>(64);
    let printer = tokio::spawn(server::forward_records(rx, std::io::stdout()));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutting down webhook receiver");
    };
    let served = server::serve(&trigger_config.listen_addr, trigger.clone(), tx, shutdown).await;

    // The server owns the only sender, so the printer ends once queued records are written.
    let printed = printer.await.context("Webhook record printer panicked")?;
    if trigger_config.test_mode {
        trigger.delete().await?;
    }
    served?;
    let count = printed?;
    info!("Forwarded {} webhook records", count);
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}
