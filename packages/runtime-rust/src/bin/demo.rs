//! Demo session: composes the micropost operations and prints each outcome as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logicbase_runtime::service::domain::{
    list_microposts, seed_user, CreateMicropost, CreateMicropostInput, RemoveMicropost,
    RemoveMicropostInput, User,
};
use logicbase_runtime::{MemoryStore, OperationRegistry, RuntimeConfig, TransactionalStore};

#[derive(Parser)]
#[command(name = "logicbase-demo")]
#[command(about = "Runs a scripted micropost session through the operation pipeline")]
struct Cli {
    /// Input keys redacted in invocation log lines.
    #[arg(
        long,
        env = "LOGICBASE_FILTER_PARAMETERS",
        value_delimiter = ',',
        default_value = "password"
    )]
    filter_parameters: Vec<String>,

    /// Omit operation inputs from the start log line.
    #[arg(long)]
    no_log_arguments: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// `PostgreSQL` connection string; the in-memory store is used when absent.
    #[cfg(feature = "postgres")]
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,logicbase_runtime=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg_attr(
    not(feature = "postgres"),
    allow(unused_variables, clippy::unused_async)
)]
async fn open_store(cli: &Cli) -> Result<Arc<dyn TransactionalStore>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &cli.database_url {
        let store = logicbase_runtime::storage::PgStore::connect(url, 5)
            .await
            .context("Failed to connect to database")?;
        tracing::info!("Using PostgreSQL store");
        return Ok(Arc::new(store));
    }

    tracing::info!("Using in-memory store");
    Ok(Arc::new(MemoryStore::new()))
}

fn print<T: Serialize>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to render outcome")?;
    println!("== {label}\n{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = RuntimeConfig {
        filter_parameters: cli.filter_parameters.clone(),
        log_arguments: !cli.no_log_arguments,
    };
    let store = open_store(&cli).await?;

    seed_user(
        store.as_ref(),
        &User {
            id: "u1".to_string(),
            name: "test_0".to_string(),
        },
    )
    .await
    .context("Failed to seed user")?;

    let registry = OperationRegistry::new(Arc::clone(&store), config);
    registry.register(CreateMicropost::new(Arc::clone(&store)))?;
    registry.register(RemoveMicropost::new(Arc::clone(&store)))?;
    tracing::info!(operations = ?registry.names(), "operations composed");

    let empty = registry
        .invoke::<CreateMicropost>(CreateMicropostInput::default())
        .await?;
    print("create with empty input", &empty)?;

    let short = registry
        .invoke::<CreateMicropost>(CreateMicropostInput {
            user_id: Some("u1".to_string()),
            content: Some("aaaa".to_string()),
        })
        .await?;
    print("create with short content", &short)?;

    let created = registry
        .invoke::<CreateMicropost>(CreateMicropostInput {
            user_id: Some("u1".to_string()),
            content: Some("  hello, micropost  ".to_string()),
        })
        .await?;
    print("create", &created)?;

    if let Some(created) = created.value() {
        let removed = registry
            .invoke::<RemoveMicropost>(RemoveMicropostInput {
                micropost_id: created.micropost.id.clone(),
                user_id: "u1".to_string(),
            })
            .await?;
        print("remove", &removed)?;
    }

    let visible = list_microposts(store.as_ref(), None).await?;
    print("visible microposts", &visible)?;
    Ok(())
}
