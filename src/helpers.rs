use super::*;

pub(super) const CB_SOCIAL_DOWNLOADER: &str = "SOCIAL_DOWNLOADER";
pub(super) const CB_TERABOX_PLAYER: &str = "TERABOX_PLAYER";
pub(super) const CB_BACK_TO_MAIN: &str = "BACK_TO_MAIN";
pub(super) const CB_SOCIAL_PREFIX: &str = "SOCIAL_";
pub(super) const CB_SEND_VIDEO: &str = "SEND_VIDEO";
pub(super) const CB_SEND_AUDIO: &str = "SEND_AUDIO";
pub(super) const CB_SEND_FILE: &str = "SEND_FILE";

pub(super) const WELCOME_TEXT: &str = "*👋 Welcome! I'm your all-in-one video downloader and player bot.*\nPick the service you want to download or watch a video from.";
pub(super) const SOCIAL_MENU_TEXT: &str = "Pick your platform:";
pub(super) const TERABOX_PROMPT_TEXT: &str =
    "Please send the *Terabox link* you want to download or watch.";
pub(super) const START_OVER_TEXT: &str =
    "Please start with the */start* command and pick a download option first.";
pub(super) const INVALID_LINK_TEXT: &str =
    "That doesn't look like a valid link. Please send a proper URL.";
pub(super) const TERABOX_PROCESSING_TEXT: &str = "🔗 Processing the Terabox link...";
pub(super) const SOCIAL_PROCESSING_TEXT: &str = "🔗 Processing the video link...";
pub(super) const TERABOX_NOT_RETRIEVED_TEXT: &str =
    "❌ Couldn't retrieve anything from that Terabox link.";
pub(super) const SOCIAL_NOT_RETRIEVED_TEXT: &str =
    "❌ Couldn't retrieve video/audio details from that link.";
pub(super) const NO_DOWNLOAD_OPTION_TEXT: &str = "❌ No download option was found for that link.";
pub(super) const API_ERROR_TEXT: &str = "😞 Something went wrong while calling the API.";
pub(super) const RESULT_EXPIRED_TEXT: &str =
    "⌛ That result has expired. Please send the link again.";
pub(super) const MEDIA_SEND_FAILED_TEXT: &str =
    "❌ Telegram couldn't fetch that file. Use the download button instead.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MenuAction {
    SocialDownloader,
    TeraboxPlayer,
    SocialPlatform(Platform),
    BackToMain,
    SendMedia(MediaKind),
}

impl MenuAction {
    pub(super) fn parse(data: &str) -> Option<Self> {
        match data {
            CB_SOCIAL_DOWNLOADER => Some(MenuAction::SocialDownloader),
            CB_TERABOX_PLAYER => Some(MenuAction::TeraboxPlayer),
            CB_BACK_TO_MAIN => Some(MenuAction::BackToMain),
            CB_SEND_VIDEO => Some(MenuAction::SendMedia(MediaKind::Video)),
            CB_SEND_AUDIO => Some(MenuAction::SendMedia(MediaKind::Audio)),
            CB_SEND_FILE => Some(MenuAction::SendMedia(MediaKind::Document)),
            _ => data
                .strip_prefix(CB_SOCIAL_PREFIX)
                .and_then(Platform::parse)
                .map(MenuAction::SocialPlatform),
        }
    }
}

// `None` leaves the chat's pending mode untouched.
pub(super) fn menu_mode(action: MenuAction) -> Option<Mode> {
    match action {
        MenuAction::SocialDownloader | MenuAction::SendMedia(_) => None,
        MenuAction::TeraboxPlayer => Some(Mode::AwaitTeraboxLink),
        MenuAction::SocialPlatform(platform) => Some(Mode::AwaitSocialLink(platform)),
        MenuAction::BackToMain => Some(Mode::None),
    }
}

pub(super) async fn apply_menu_mode(store: &dyn StateStore, chat_id: i64, action: MenuAction) {
    if let Some(mode) = menu_mode(action) {
        record_mode(store, chat_id, mode).await;
    }
}

pub(super) fn platform_callback_data(platform: Platform) -> String {
    format!("{}{}", CB_SOCIAL_PREFIX, platform.as_str())
}

pub(super) fn platform_prompt_text(platform: Platform) -> String {
    format!(
        "You picked *{}*. Please send the *video link*.",
        platform.display_name()
    )
}

pub(super) fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🌐 Social downloader",
            CB_SOCIAL_DOWNLOADER,
        )],
        vec![InlineKeyboardButton::callback(
            "📦 Terabox player & downloader",
            CB_TERABOX_PLAYER,
        )],
    ])
}

pub(super) fn social_menu_keyboard() -> InlineKeyboardMarkup {
    let button = |icon: &str, platform: Platform| {
        InlineKeyboardButton::callback(
            format!("{} {}", icon, platform.display_name()),
            platform_callback_data(platform),
        )
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📷", Platform::Instagram),
            button("📘", Platform::Facebook),
        ],
        vec![button("▶️", Platform::Youtube), button("➕", Platform::Other)],
        back_to_main_row(),
    ])
}

pub(super) fn back_to_main_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback("⬅️ Main menu", CB_BACK_TO_MAIN)]
}

pub(super) fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(super) fn is_http_link(link: &str) -> bool {
    let scheme = link.get(..8).unwrap_or(link).to_ascii_lowercase();
    scheme.starts_with("http://") || scheme.starts_with("https://")
}

pub(super) fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let cmd = first.trim_start_matches('/');
    Some(cmd.split('@').next().unwrap_or(cmd))
}

pub(super) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

pub(super) async fn send_ephemeral(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    ttl_secs: u64,
) -> Result<()> {
    let sent = bot.send_message(chat_id, text).await?;
    let bot = bot.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(ttl_secs)).await;
        let _ = bot.delete_message(chat_id, sent.id).await;
    });
    Ok(())
}

pub(super) struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub(super) fn new(bot: Bot, chat_id: ChatId) -> Self {
        TelegramSink { bot, chat_id }
    }

    async fn send_photo(
        &self,
        photo: String,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<()> {
        if let Ok(photo_url) = reqwest::Url::parse(&photo) {
            let sent = self
                .bot
                .send_photo(self.chat_id, InputFile::url(photo_url))
                .caption(caption.clone())
                .parse_mode(ParseMode::Markdown)
                .reply_markup(keyboard.clone())
                .await;
            match sent {
                Ok(_) => return Ok(()),
                Err(err) => warn!("send photo {} failed, sending text instead: {}", photo, err),
            }
        }
        self.bot
            .send_message(self.chat_id, caption)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }

    async fn send_media(&self, kind: MediaKind, url: String) -> Result<()> {
        let target =
            reqwest::Url::parse(&url).with_context(|| format!("invalid media url {:?}", url))?;
        let file = InputFile::url(target);
        let sent = match kind {
            MediaKind::Video => self.bot.send_video(self.chat_id, file).await,
            MediaKind::Audio => self.bot.send_audio(self.chat_id, file).await,
            MediaKind::Document => self.bot.send_document(self.chat_id, file).await,
        };
        if let Err(err) = sent {
            warn!("send {:?} {} failed: {}", kind, url, err);
            self.bot
                .send_message(self.chat_id, MEDIA_SEND_FAILED_TEXT)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn send(&self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Status(text) => {
                send_ephemeral(&self.bot, self.chat_id, &text, STATUS_TTL_SECS).await
            }
            Reply::Text { text, markdown } => {
                let mut request = self.bot.send_message(self.chat_id, text);
                if markdown {
                    request = request.parse_mode(ParseMode::Markdown);
                }
                request.await?;
                Ok(())
            }
            Reply::Photo {
                photo,
                caption,
                keyboard,
            } => self.send_photo(photo, caption, keyboard).await,
            Reply::Media { kind, url } => self.send_media(kind, url).await,
        }
    }
}

pub(super) fn resolve_token(input: TokenInput, config_dir: &Path) -> Result<String> {
    match input {
        TokenInput::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(anyhow!("token is empty"));
            }
            Ok(trimmed.to_string())
        }
        TokenInput::File { file } => {
            let path = resolve_config_path(&file, config_dir);
            read_token_file(&path)
        }
    }
}

pub(super) fn resolve_config_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_relative() {
        config_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

pub(super) fn read_token_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read token file {}", path.display()))?;
    let token = contents.trim();
    if token.is_empty() {
        return Err(anyhow!("token file {} is empty", path.display()));
    }
    Ok(token.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn load_config(
    path: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Config> {
    let (config_file, config_dir) = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let config_file: ConfigFile = toml::from_str(&contents).context("parse config")?;
            let config_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            (config_file, config_dir)
        }
        None => (ConfigFile::default(), PathBuf::from(".")),
    };

    let token = match config_file.token {
        Some(input) => resolve_token(input, &config_dir)?,
        None => non_empty(env("BOT_TOKEN"))
            .ok_or_else(|| anyhow!("bot token missing: set `token` in the config or BOT_TOKEN"))?,
    };

    let mut state = config_file.state;
    state.redis_url = non_empty(state.redis_url).or_else(|| non_empty(env("REDIS_URL")));

    let mut webhook = config_file.webhook;
    webhook.public_url =
        non_empty(webhook.public_url).or_else(|| non_empty(env("PUBLIC_URL")));
    if let Some(port) = non_empty(env("PORT")) {
        let port: u16 = port
            .parse()
            .with_context(|| format!("parse PORT {:?}", port))?;
        webhook.listen.set_port(port);
    }
    if !webhook.path.starts_with('/') {
        webhook.path = format!("/{}", webhook.path);
    }

    Ok(Config {
        token,
        transport: config_file.transport.unwrap_or_default(),
        upstream: config_file.upstream,
        state,
        webhook,
    })
}
