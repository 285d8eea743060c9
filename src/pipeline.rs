use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MediaKind {
    Video,
    Audio,
    Document,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Reply {
    Status(String),
    Text {
        text: String,
        markdown: bool,
    },
    Photo {
        photo: String,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    },
    Media {
        kind: MediaKind,
        url: String,
    },
}

impl Reply {
    pub(super) fn text(text: &str) -> Self {
        Reply::Text {
            text: text.to_string(),
            markdown: false,
        }
    }

    pub(super) fn markdown(text: &str) -> Self {
        Reply::Text {
            text: text.to_string(),
            markdown: true,
        }
    }
}

#[async_trait]
pub(super) trait ReplySink: Send + Sync {
    async fn send(&self, reply: Reply) -> Result<()>;
}

pub(super) async fn handle_link_message(
    state: &AppState,
    chat_id: i64,
    text: &str,
    sink: &dyn ReplySink,
) {
    let mode = take_mode(state.store.as_ref(), chat_id).await;
    if let Some(media) = resolve_link(&state.upstream, mode, text, sink).await {
        state.results.remember(chat_id, media).await;
    }
}

pub(super) async fn resolve_link(
    upstream: &UpstreamClient,
    mode: Mode,
    text: &str,
    sink: &dyn ReplySink,
) -> Option<MediaResult> {
    let link = text.trim();

    if mode == Mode::None {
        deliver(sink, Reply::markdown(START_OVER_TEXT)).await;
        return None;
    }
    if !is_http_link(link) {
        deliver(sink, Reply::text(INVALID_LINK_TEXT)).await;
        return None;
    }

    let (reply, media) = match mode {
        Mode::AwaitTeraboxLink => {
            deliver(sink, Reply::Status(TERABOX_PROCESSING_TEXT.to_string())).await;
            resolve_terabox(upstream, link).await
        }
        Mode::AwaitSocialLink(_) => {
            deliver(sink, Reply::Status(SOCIAL_PROCESSING_TEXT.to_string())).await;
            resolve_social(upstream, link).await
        }
        Mode::None => return None,
    };
    deliver(sink, reply).await;
    media
}

async fn resolve_terabox(upstream: &UpstreamClient, link: &str) -> (Reply, Option<MediaResult>) {
    let outcome = match upstream.fetch_terabox(link).await {
        Ok(payload) => payload.into_outcome(),
        Err(err) => {
            error!("terabox lookup for {} failed: {:#}", link, err);
            return (Reply::text(API_ERROR_TEXT), None);
        }
    };

    let reply = match outcome {
        LinkOutcome::Found(media) => match build_terabox_reply(&media) {
            Ok(reply) => return (reply, Some(media)),
            Err(err) => {
                error!("terabox result for {} unusable: {:#}", link, err);
                Reply::text(API_ERROR_TEXT)
            }
        },
        LinkOutcome::NotRetrieved(reason) => {
            warn!("terabox lookup for {} returned nothing: {}", link, reason);
            Reply::text(TERABOX_NOT_RETRIEVED_TEXT)
        }
        LinkOutcome::NoDownloadOption => Reply::text(NO_DOWNLOAD_OPTION_TEXT),
    };
    (reply, None)
}

async fn resolve_social(upstream: &UpstreamClient, link: &str) -> (Reply, Option<MediaResult>) {
    let outcome = match upstream.fetch_social(link).await {
        Ok(payload) => payload.into_outcome(),
        Err(err) => {
            error!("social lookup for {} failed: {:#}", link, err);
            return (Reply::text(API_ERROR_TEXT), None);
        }
    };

    let reply = match outcome {
        LinkOutcome::Found(media) => match build_social_reply(&media, link) {
            Ok(reply) => return (reply, Some(media)),
            Err(err) => {
                error!("social result for {} unusable: {:#}", link, err);
                Reply::text(API_ERROR_TEXT)
            }
        },
        LinkOutcome::NotRetrieved(reason) => {
            warn!("social lookup for {} returned nothing: {}", link, reason);
            Reply::text(SOCIAL_NOT_RETRIEVED_TEXT)
        }
        LinkOutcome::NoDownloadOption => Reply::text(NO_DOWNLOAD_OPTION_TEXT),
    };
    (reply, None)
}

pub(super) fn build_terabox_reply(media: &MediaResult) -> Result<Reply> {
    let video = media
        .video
        .as_ref()
        .ok_or_else(|| anyhow!("terabox result without media url"))?;
    let target = parse_button_url(&video.url)?;
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::url("▶️ WATCH VIDEO", target.clone()),
            InlineKeyboardButton::url("⬇️ DOWNLOAD VIDEO", target),
        ],
        vec![
            InlineKeyboardButton::callback("📺 Play here", CB_SEND_VIDEO),
            InlineKeyboardButton::callback("📄 Send as file", CB_SEND_FILE),
        ],
        back_to_main_row(),
    ]);
    let caption = format!(
        "*📦 Terabox file found:*\n\n*Title:* {}",
        escape_markdown(&media.title)
    );
    Ok(Reply::Photo {
        photo: media
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| video.url.clone()),
        caption,
        keyboard,
    })
}

pub(super) fn build_social_reply(media: &MediaResult, link: &str) -> Result<Reply> {
    let mut rows = Vec::new();
    if let Some(video) = &media.video {
        let label = format!(
            "⬇️ Download Video ({})",
            video.label.as_deref().unwrap_or("Best")
        );
        rows.push(vec![InlineKeyboardButton::url(
            label,
            parse_button_url(&video.url)?,
        )]);
    }
    if let Some(audio) = &media.audio {
        let label = format!(
            "🎵 Download Audio ({})",
            audio.label.as_deref().unwrap_or("Best")
        );
        rows.push(vec![InlineKeyboardButton::url(
            label,
            parse_button_url(&audio.url)?,
        )]);
    }
    if rows.is_empty() {
        return Ok(Reply::text(NO_DOWNLOAD_OPTION_TEXT));
    }
    let mut send_here = Vec::new();
    if media.video.is_some() {
        send_here.push(InlineKeyboardButton::callback(
            "🎬 Send video here",
            CB_SEND_VIDEO,
        ));
    }
    if media.audio.is_some() {
        send_here.push(InlineKeyboardButton::callback(
            "🎵 Send audio here",
            CB_SEND_AUDIO,
        ));
    }
    rows.push(send_here);
    rows.push(back_to_main_row());

    let caption = format!(
        "*🌐 Video found!*\n\n*Title:* {}\n\nPick the format you want:",
        escape_markdown(&media.title)
    );
    Ok(Reply::Photo {
        photo: media
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| link.to_string()),
        caption,
        keyboard: InlineKeyboardMarkup::new(rows),
    })
}

pub(super) fn media_reply(media: &MediaResult, kind: MediaKind) -> Option<Reply> {
    let link = match kind {
        MediaKind::Video | MediaKind::Document => media.video.as_ref(),
        MediaKind::Audio => media.audio.as_ref(),
    }?;
    Some(Reply::Media {
        kind,
        url: link.url.clone(),
    })
}

// Sends the chat's last result straight into the chat instead of as a link.
pub(super) async fn send_remembered_media(
    results: &ResultCache,
    chat_id: i64,
    kind: MediaKind,
    sink: &dyn ReplySink,
) {
    let reply = match results.recall(chat_id).await {
        Some(media) => {
            media_reply(&media, kind).unwrap_or_else(|| Reply::text(NO_DOWNLOAD_OPTION_TEXT))
        }
        None => Reply::text(RESULT_EXPIRED_TEXT),
    };
    deliver(sink, reply).await;
}

fn parse_button_url(raw: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(raw).with_context(|| format!("invalid button url {:?}", raw))
}

async fn deliver(sink: &dyn ReplySink, reply: Reply) {
    if let Err(err) = sink.send(reply).await {
        error!("reply delivery failed: {:#}", err);
    }
}
