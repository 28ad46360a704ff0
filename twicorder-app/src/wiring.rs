//! Assembles the Scheduler and its collaborators from the on-disk
//! configuration (spec.md §4.10), the way the teacher's `tether.rs` wired
//! its actor fleet: reserve every actor address up front, start infra
//! first, then resolve addresses for the pieces that depend on them.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::info;

use twicorder_auth::{CredentialProvider, OAuth1Credentials};
use twicorder_config::{ConfigService, Credentials, TaskList};
use twicorder_engine::builder::Builder;
use twicorder_engine::output::{OutputWriter, SqliteDocumentStore};
use twicorder_engine::rate_limit::RateLimitCentral;
use twicorder_engine::scheduler::Scheduler;
use twicorder_engine::store::AppDataStore;
use twicorder_engine::task::{Task, TaskManager};
use twicorder_engine::user_cache::UserCache;
use twicorder_social::TwitterClient;

/// Everything `run` needs to drive the process to completion: the
/// `Builder` (owns the actor fleet, joined on shutdown) and the
/// already-spawned Scheduler task.
pub struct RunHandle {
    builder: Builder,
    scheduler_task: JoinHandle<()>,
}

pub async fn build(
    credentials_path: &Path,
    tasks_path: &Path,
    config_path: &Path,
    database_url: &str,
) -> Result<RunHandle> {
    let credentials = Credentials::load(credentials_path)
        .with_context(|| format!("loading credentials from {}", credentials_path.display()))?;
    let task_list = TaskList::load(tasks_path)
        .with_context(|| format!("loading task list from {}", tasks_path.display()))?;
    let config_service = Arc::new(
        ConfigService::load(config_path)
            .with_context(|| format!("loading runtime config from {}", config_path.display()))?,
    );
    let config = config_service.get();

    let oauth1 = OAuth1Credentials {
        consumer_key: credentials.application.consumer_key,
        consumer_secret: credentials.application.consumer_secret,
        token: credentials.user.key,
        token_secret: credentials.user.secret,
    };
    let mut provider = CredentialProvider::new(oauth1);
    if let Some(bearer) = credentials.bearer_token {
        provider = provider.with_bearer(bearer);
    }
    let client = TwitterClient::new(provider).context("constructing the Twitter client")?;

    let connect_options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url {database_url}"))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(connect_options)
        .await
        .context("connecting to the app-data database")?;

    let mut builder = Builder::new();
    let shutdown = builder.shutdown_handle();

    let r_rate = builder.reserve::<RateLimitCentral>("rate_limit", 256);
    let r_store = builder.reserve::<AppDataStore>("app_data_store", 256);
    let r_user_cache = if config.full_user_mentions {
        Some(builder.reserve::<UserCache>("user_cache", 256))
    } else {
        None
    };

    builder.start_reserved(r_rate, RateLimitCentral::new());

    let store = AppDataStore::new(pool.clone())
        .await
        .context("running app-data store migrations")?;
    builder.start_reserved(r_store, store);

    if let Some(r_user_cache) = r_user_cache {
        let ttl = Duration::from_secs(config.user_lookup_interval * 60);
        builder.start_reserved(r_user_cache, UserCache::new(ttl));
    }

    let rate_addr = builder
        .addr::<RateLimitCentral>("rate_limit")
        .expect("rate_limit address just reserved");
    let store_addr = builder
        .addr::<AppDataStore>("app_data_store")
        .expect("app_data_store address just reserved");
    let user_cache_addr = if config.full_user_mentions {
        Some(
            builder
                .addr::<UserCache>("user_cache")
                .expect("user_cache address just reserved"),
        )
    } else {
        None
    };

    let mut output = OutputWriter::new(config.output_dir.clone(), config.save_postfix.clone())
        .with_prefix(config.save_prefix.clone())
        .with_config_service(config_service.clone());
    if config.use_mongo {
        let document_store = SqliteDocumentStore::new(pool.clone())
            .await
            .context("preparing the document store table")?;
        output = output.with_document_store(Box::new(document_store));
    }

    let exchange = twicorder_engine::exchange::QueryExchange::new(
        client,
        rate_addr,
        store_addr,
        output,
        user_cache_addr,
    );

    let tasks: Vec<Task> = task_list
        .entries()
        .map(|(kind, raw)| {
            Task::new(
                kind,
                raw.frequency,
                raw.multipart,
                raw.output.clone(),
                raw.kwargs.clone(),
            )
        })
        .collect();
    info!(task_count = tasks.len(), "wiring.tasks_loaded");
    let task_manager = TaskManager::new(tasks);

    let mut scheduler = Scheduler::new(task_manager, exchange);
    let scheduler_shutdown = shutdown.subscribe();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    Ok(RunHandle {
        builder,
        scheduler_task,
    })
}

pub async fn run(handle: RunHandle) -> Result<()> {
    handle.builder.run_until_ctrl_c().await?;
    handle
        .scheduler_task
        .await
        .context("scheduler task panicked")?;
    Ok(())
}
