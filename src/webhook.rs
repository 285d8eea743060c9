use super::*;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use teloxide::types::UpdateKind;
use tokio::net::TcpListener;

#[derive(Clone)]
pub(super) struct WebhookState {
    pub(super) bot: Bot,
    pub(super) app: std::sync::Arc<AppState>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct WebhookQuery {
    set_webhook: Option<String>,
}

pub(super) async fn run_webhook(bot: Bot, state: std::sync::Arc<AppState>) -> Result<()> {
    let webhook = &state.config.webhook;
    if webhook.register_on_start {
        match webhook_url(webhook)? {
            Some(url) => {
                if let Err(err) = register_webhook(&bot, url).await {
                    error!("webhook registration on start failed: {:#}", err);
                }
            }
            None => warn!("register_on_start is set but no public_url is configured"),
        }
    }

    let listen = webhook.listen;
    let app = webhook_router(bot, state.clone());
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {}", listen))?;
    info!("webhook server listening on {}", listen);
    axum::serve(listener, app)
        .await
        .context("webhook server failed")?;
    Ok(())
}

pub(super) fn webhook_router(bot: Bot, app: std::sync::Arc<AppState>) -> Router {
    let path = app.config.webhook.path.clone();
    Router::new()
        .route(&path, any(handle_webhook))
        .route("/health", get(|| async { "OK" }))
        .with_state(WebhookState { bot, app })
}

pub(super) fn webhook_url(config: &WebhookConfig) -> Result<Option<reqwest::Url>> {
    let Some(public_url) = config.public_url.as_deref() else {
        return Ok(None);
    };
    let base = public_url.trim_end_matches('/');
    let base = if is_http_link(base) {
        base.to_string()
    } else {
        format!("https://{}", base)
    };
    let raw = format!("{}{}", base, config.path);
    let url = reqwest::Url::parse(&raw).with_context(|| format!("parse webhook url {}", raw))?;
    Ok(Some(url))
}

async fn register_webhook(bot: &Bot, url: reqwest::Url) -> Result<()> {
    bot.set_webhook(url.clone())
        .await
        .with_context(|| format!("set webhook {}", url))?;
    info!("webhook set to {}", url);
    Ok(())
}

pub(super) async fn handle_webhook(
    State(state): State<WebhookState>,
    method: Method,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if query.set_webhook.as_deref() == Some("true") {
        match webhook_url(&state.app.config.webhook) {
            Ok(Some(url)) => {
                return match register_webhook(&state.bot, url).await {
                    Ok(()) => (StatusCode::OK, "Webhook set successfully!"),
                    Err(err) => {
                        error!("webhook registration failed: {:#}", err);
                        (StatusCode::INTERNAL_SERVER_ERROR, "Error setting webhook.")
                    }
                };
            }
            Ok(None) => {}
            Err(err) => {
                error!("webhook registration failed: {:#}", err);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Error setting webhook.");
            }
        }
    }

    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            error!("unreadable webhook update: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    // Handler failures are acknowledged so Telegram does not redeliver.
    if let Err(err) = dispatch_update(state.bot.clone(), update, state.app.clone()).await {
        error!("update handling failed: {:#}", err);
    }
    (StatusCode::OK, "OK")
}

pub(super) async fn dispatch_update(
    bot: Bot,
    update: Update,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    match update.kind {
        UpdateKind::Message(msg) => message_handlers::handle_message(bot, msg, state).await,
        UpdateKind::CallbackQuery(q) => callback_handlers::handle_callback(bot, q, state).await,
        _ => Ok(()),
    }
}
