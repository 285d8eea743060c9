use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message, ParseMode};
use tokio::sync::Mutex;

mod callback_handlers;
mod helpers;
mod message_handlers;
mod pipeline;
mod state_store;
mod upstream;
mod webhook;


use helpers::*;
use pipeline::*;
use state_store::*;
use upstream::*;

const STATUS_TTL_SECS: u64 = 30;
const DEFAULT_STATE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SOCIAL_ENDPOINT: &str = "https://downloaderpro.xo.je/mesin/dwn.php/";
const DEFAULT_TERABOX_ENDPOINT: &str = "https://wadownloader.amitdas.site/api/TeraBox/main/";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

#[derive(Debug, Clone)]
struct Config {
    token: String,
    transport: Transport,
    upstream: UpstreamConfig,
    state: StateConfig,
    webhook: WebhookConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    token: Option<TokenInput>,
    transport: Option<Transport>,
    #[serde(default)]
    upstream: UpstreamConfig,
    #[serde(default)]
    state: StateConfig,
    #[serde(default)]
    webhook: WebhookConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenInput {
    String(String),
    File { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
enum Transport {
    #[default]
    Polling,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UpstreamConfig {
    social_endpoint: String,
    terabox_endpoint: String,
    timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            social_endpoint: DEFAULT_SOCIAL_ENDPOINT.to_string(),
            terabox_endpoint: DEFAULT_TERABOX_ENDPOINT.to_string(),
            timeout_seconds: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StateConfig {
    ttl_seconds: u64,
    redis_url: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            ttl_seconds: DEFAULT_STATE_TTL_SECS,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct WebhookConfig {
    listen: SocketAddr,
    public_url: Option<String>,
    path: String,
    register_on_start: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            public_url: None,
            path: DEFAULT_WEBHOOK_PATH.to_string(),
            register_on_start: false,
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    transport: Option<Transport>,
}

struct AppState {
    config: Config,
    store: std::sync::Arc<dyn StateStore>,
    results: ResultCache,
    upstream: UpstreamClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref(), &|key: &str| std::env::var(key).ok())?;
    if let Some(transport) = args.transport {
        config.transport = transport;
    }

    let store = build_state_store(&config.state)?;
    let upstream = UpstreamClient::new(&config.upstream)?;
    let state = std::sync::Arc::new(AppState {
        results: ResultCache::new(config.state.ttl_seconds),
        config: config.clone(),
        store,
        upstream,
    });

    let bot = Bot::new(config.token.clone());

    match config.transport {
        Transport::Polling => run_polling(bot, state).await,
        Transport::Webhook => webhook::run_webhook(bot, state).await,
    }
}

async fn run_polling(bot: Bot, state: std::sync::Arc<AppState>) -> Result<()> {
    if let Err(err) = bot.delete_webhook().await {
        warn!("delete webhook failed, polling anyway: {}", err);
    }
    info!("starting long polling");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(callback_handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
