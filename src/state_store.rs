use super::*;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

const REDIS_KEY_PREFIX: &str = "linkrelay:state:";
const TERABOX_MODE_KEY: &str = "TERABOX_LINK_EXPECTED";
const SOCIAL_MODE_PREFIX: &str = "SOCIAL_LINK_EXPECTED_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Platform {
    Instagram,
    Facebook,
    Youtube,
    Other,
}

impl Platform {
    pub(super) const ALL: [Platform; 4] = [
        Platform::Instagram,
        Platform::Facebook,
        Platform::Youtube,
        Platform::Other,
    ];

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "INSTAGRAM",
            Platform::Facebook => "FACEBOOK",
            Platform::Youtube => "YOUTUBE",
            Platform::Other => "OTHER",
        }
    }

    pub(super) fn parse(raw: &str) -> Option<Self> {
        Platform::ALL.into_iter().find(|p| p.as_str() == raw)
    }

    pub(super) fn display_name(self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Youtube => "YouTube",
            Platform::Other => "100+ sites",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(super) enum Mode {
    None,
    AwaitSocialLink(Platform),
    AwaitTeraboxLink,
}

impl Mode {
    pub(super) fn encode(self) -> String {
        match self {
            Mode::None => "NONE".to_string(),
            Mode::AwaitTeraboxLink => TERABOX_MODE_KEY.to_string(),
            Mode::AwaitSocialLink(platform) => {
                format!("{}{}", SOCIAL_MODE_PREFIX, platform.as_str())
            }
        }
    }

    pub(super) fn decode(raw: &str) -> Option<Self> {
        match raw {
            "NONE" => Some(Mode::None),
            TERABOX_MODE_KEY => Some(Mode::AwaitTeraboxLink),
            _ => raw
                .strip_prefix(SOCIAL_MODE_PREFIX)
                .and_then(Platform::parse)
                .map(Mode::AwaitSocialLink),
        }
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.encode()
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        Mode::decode(&raw).ok_or_else(|| format!("unknown chat mode {:?}", raw))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(super) struct ChatState {
    pub(super) chat_id: i64,
    pub(super) mode: Mode,
    pub(super) updated_at: i64,
}

impl ChatState {
    fn new(chat_id: i64, mode: Mode) -> Self {
        ChatState {
            chat_id,
            mode,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

// `consume_state` must remove and return the record in one atomic step, so
// two concurrent messages from the same chat never both see a pending mode.
// Setting `Mode::None` removes the record.
#[async_trait]
pub(super) trait StateStore: Send + Sync {
    async fn set_state(&self, chat_id: i64, mode: Mode) -> Result<()>;
    async fn consume_state(&self, chat_id: i64) -> Result<Mode>;
}

pub(super) fn build_state_store(config: &StateConfig) -> Result<std::sync::Arc<dyn StateStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStateStore::open(url, config.ttl_seconds)?;
            info!("conversation state stored in redis");
            Ok(std::sync::Arc::new(store))
        }
        None => {
            info!("conversation state stored in memory");
            Ok(std::sync::Arc::new(MemoryStateStore::new(config.ttl_seconds)))
        }
    }
}

pub(super) async fn record_mode(store: &dyn StateStore, chat_id: i64, mode: Mode) {
    if let Err(err) = store.set_state(chat_id, mode).await {
        warn!("set state for chat {} failed: {:#}", chat_id, err);
    }
}

pub(super) async fn take_mode(store: &dyn StateStore, chat_id: i64) -> Mode {
    match store.consume_state(chat_id).await {
        Ok(mode) => mode,
        Err(err) => {
            warn!("consume state for chat {} failed: {:#}", chat_id, err);
            Mode::None
        }
    }
}

struct StoredState {
    state: ChatState,
    expires_at: u64,
}

pub(super) struct MemoryStateStore {
    ttl_secs: u64,
    records: Mutex<HashMap<i64, StoredState>>,
}

impl MemoryStateStore {
    pub(super) fn new(ttl_secs: u64) -> Self {
        MemoryStateStore {
            ttl_secs,
            records: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(super) async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn set_state(&self, chat_id: i64, mode: Mode) -> Result<()> {
        let now = now_ts();
        let mut records = self.records.lock().await;
        records.retain(|_, record| record.expires_at > now);
        if mode == Mode::None {
            records.remove(&chat_id);
            return Ok(());
        }
        records.insert(
            chat_id,
            StoredState {
                state: ChatState::new(chat_id, mode),
                expires_at: now + self.ttl_secs,
            },
        );
        Ok(())
    }

    async fn consume_state(&self, chat_id: i64) -> Result<Mode> {
        let record = self.records.lock().await.remove(&chat_id);
        match record {
            Some(record) if record.expires_at > now_ts() => Ok(record.state.mode),
            _ => Ok(Mode::None),
        }
    }
}

struct RememberedResult {
    media: MediaResult,
    expires_at: u64,
}

// Last resolved result per chat, read back by the "send here" buttons.
pub(super) struct ResultCache {
    ttl_secs: u64,
    results: Mutex<HashMap<i64, RememberedResult>>,
}

impl ResultCache {
    pub(super) fn new(ttl_secs: u64) -> Self {
        ResultCache {
            ttl_secs,
            results: Mutex::new(HashMap::new()),
        }
    }

    pub(super) async fn remember(&self, chat_id: i64, media: MediaResult) {
        let now = now_ts();
        let mut results = self.results.lock().await;
        results.retain(|_, result| result.expires_at > now);
        results.insert(
            chat_id,
            RememberedResult {
                media,
                expires_at: now + self.ttl_secs,
            },
        );
    }

    pub(super) async fn recall(&self, chat_id: i64) -> Option<MediaResult> {
        let now = now_ts();
        self.results
            .lock()
            .await
            .get(&chat_id)
            .filter(|result| result.expires_at > now)
            .map(|result| result.media.clone())
    }
}

pub(super) struct RedisStateStore {
    client: redis::Client,
    ttl_secs: u64,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStateStore {
    pub(super) fn open(url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(url).context("parse redis url")?;
        Ok(RedisStateStore {
            client,
            // Redis rejects `SET ... EX 0`.
            ttl_secs: ttl_secs.max(1),
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("connect to redis")?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn drop_connection(&self) {
        *self.connection.lock().await = None;
    }

    async fn set_inner(&self, chat_id: i64, mode: Mode) -> Result<()> {
        let mut conn = self.connection().await?;
        let key = redis_key(chat_id);
        if mode == Mode::None {
            let _: () = conn.del(&key).await.context("redis DEL")?;
            return Ok(());
        }
        let value = serde_json::to_string(&ChatState::new(chat_id, mode))
            .context("serialize chat state")?;
        let _: () = conn
            .set_ex(&key, value, self.ttl_secs)
            .await
            .context("redis SET EX")?;
        Ok(())
    }

    async fn consume_inner(&self, chat_id: i64) -> Result<Mode> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(redis_key(chat_id))
            .query_async(&mut conn)
            .await
            .context("redis GETDEL")?;
        let Some(raw) = raw else {
            return Ok(Mode::None);
        };
        let state: ChatState = serde_json::from_str(&raw).context("parse stored chat state")?;
        Ok(state.mode)
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn set_state(&self, chat_id: i64, mode: Mode) -> Result<()> {
        let result = self.set_inner(chat_id, mode).await;
        if result.is_err() {
            self.drop_connection().await;
        }
        result
    }

    async fn consume_state(&self, chat_id: i64) -> Result<Mode> {
        let result = self.consume_inner(chat_id).await;
        if result.is_err() {
            self.drop_connection().await;
        }
        result
    }
}

pub(super) fn redis_key(chat_id: i64) -> String {
    format!("{}{}", REDIS_KEY_PREFIX, chat_id)
}
