use super::*;
use serde::de::{DeserializeOwned, Deserializer};

const CONNECT_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = concat!("linkrelay-bot/", env!("CARGO_PKG_VERSION"));
const UNTITLED: &str = "Untitled";

pub(super) struct UpstreamClient {
    http: reqwest::Client,
    social_endpoint: String,
    terabox_endpoint: String,
}

impl UpstreamClient {
    pub(super) fn new(config: &UpstreamConfig) -> Result<Self> {
        let timeout = config.timeout_seconds.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(timeout.min(CONNECT_TIMEOUT_SECS)))
            .user_agent(USER_AGENT)
            .build()
            .context("build upstream http client")?;
        Ok(UpstreamClient {
            http,
            social_endpoint: config.social_endpoint.clone(),
            terabox_endpoint: config.terabox_endpoint.clone(),
        })
    }

    pub(super) async fn fetch_terabox(&self, link: &str) -> Result<TeraboxResponse> {
        self.get_json(&self.terabox_endpoint, link)
            .await
            .context("terabox api")
    }

    pub(super) async fn fetch_social(&self, link: &str) -> Result<SocialResponse> {
        self.get_json(&self.social_endpoint, link)
            .await
            .context("social downloader api")
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, link: &str) -> Result<T> {
        let response = self
            .http
            .get(endpoint)
            .query(&[("url", link)])
            .send()
            .await
            .with_context(|| format!("GET {}", endpoint))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("GET {}", endpoint))?;
        let body = response.text().await.context("read response body")?;
        serde_json::from_str(&body).context("parse response body")
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TeraboxResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    media_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SocialResponse {
    #[serde(rename = "statusCode", default)]
    status_code: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumbnail: Option<String>,
    #[serde(default)]
    medias: Option<Vec<SocialMedia>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SocialMedia {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    resolution: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    quality: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct MediaResult {
    pub(super) title: String,
    pub(super) thumbnail_url: Option<String>,
    pub(super) video: Option<MediaLink>,
    pub(super) audio: Option<MediaLink>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct MediaLink {
    pub(super) url: String,
    pub(super) label: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum LinkOutcome {
    Found(MediaResult),
    NotRetrieved(String),
    NoDownloadOption,
}

impl TeraboxResponse {
    pub(super) fn into_outcome(self) -> LinkOutcome {
        if self.status.as_deref() != Some("success") {
            return LinkOutcome::NotRetrieved(format!("status {:?}", self.status));
        }
        let Some(media_url) = self.media_url else {
            return LinkOutcome::NotRetrieved("missing media_url".to_string());
        };
        LinkOutcome::Found(MediaResult {
            title: self.title.unwrap_or_else(|| UNTITLED.to_string()),
            thumbnail_url: self.thumbnail,
            video: Some(MediaLink {
                url: media_url,
                label: None,
            }),
            audio: None,
        })
    }
}

impl SocialResponse {
    pub(super) fn into_outcome(self) -> LinkOutcome {
        let status_code = self.status_code.as_ref().and_then(serde_json::Value::as_u64);
        if status_code != Some(200) {
            return LinkOutcome::NotRetrieved(format!("statusCode {:?}", self.status_code));
        }
        let medias = self.medias.unwrap_or_default();
        let video = first_of_kind(&medias, "video");
        let audio = first_of_kind(&medias, "audio");
        if video.is_none() && audio.is_none() {
            return LinkOutcome::NoDownloadOption;
        }

        let thumbnail_url = self
            .thumbnail
            .or_else(|| video.and_then(|media| media.thumbnail.clone()));
        LinkOutcome::Found(MediaResult {
            title: self.title.unwrap_or_else(|| UNTITLED.to_string()),
            thumbnail_url,
            video: video.and_then(|media| media_link(media, media.resolution.clone())),
            audio: audio.and_then(|media| media_link(media, media.quality.clone())),
        })
    }
}

fn first_of_kind<'a>(medias: &'a [SocialMedia], kind: &str) -> Option<&'a SocialMedia> {
    medias
        .iter()
        .find(|media| media.kind.as_deref() == Some(kind) && media.url.is_some())
}

fn media_link(media: &SocialMedia, label: Option<String>) -> Option<MediaLink> {
    media.url.clone().map(|url| MediaLink { url, label })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let text = match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => return Ok(None),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
