//! Best-effort YouTube lookups by scraping public pages. No API key is involved.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::error::{HubError, HubResult};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const ACCEPT_LANG: &str = "en-US,en;q=0.9";
const SHORTS_SEARCH_FILTER: &str = "EgIYAQ==";

const BLOCKED_EMBED_PHRASES: [&str; 5] = [
    "video unavailable",
    "playback on other websites has been disabled",
    "this video is private",
    "sign in to confirm your age",
    "this video is not available",
];

static VIDEO_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern"));
static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{2,100}$").expect("handle pattern"));
static WATCH_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"watch\?v=([A-Za-z0-9_-]{11})").expect("watch link pattern"));
// Shorts links also appear in embedded JSON with escaped slashes.
static SHORTS_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\?/shorts\\?/([A-Za-z0-9_-]{11})").expect("shorts link pattern"));

pub fn is_valid_video_id(id: &str) -> bool {
    VIDEO_ID_RE.is_match(id)
}

pub fn is_valid_handle(handle: &str) -> bool {
    HANDLE_RE.is_match(handle)
}

/// Strips `@`, a URL scheme and whitespace from a configured channel handle.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    let no_at = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let lower = no_at.to_ascii_lowercase();
    let no_scheme = if lower.starts_with("https://") {
        &no_at[8..]
    } else if lower.starts_with("http://") {
        &no_at[7..]
    } else {
        no_at
    };
    no_scheme.split_whitespace().collect()
}

/// Clamp a `max` query parameter; missing, zero or unparsable values use the default.
pub fn clamp_max(raw: Option<&str>, default: usize, upper: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n != 0.0)
        .map(|n| n.clamp(1.0, upper as f64) as usize)
        .unwrap_or(default)
        .clamp(1, upper)
}

/// Video id of a youtu.be, watch, embed or shorts link.
pub fn video_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let truncate = |s: &str| s.chars().take(11).collect::<String>();

    let id = if host == "youtu.be" {
        truncate(url.path().trim_start_matches('/'))
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        if url.path() == "/watch" {
            url.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| truncate(&v))
                .unwrap_or_default()
        } else {
            let parts: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
            parts
                .iter()
                .position(|p| *p == "embed" || *p == "shorts")
                .and_then(|i| parts.get(i + 1))
                .map(|s| truncate(s))
                .unwrap_or_default()
        }
    } else {
        String::new()
    };

    Some(id).filter(|s| !s.is_empty())
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

/// The balanced `{...}` object that follows `marker` in `text`.
pub fn extract_json_object_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let idx = text.find(marker)?;
    let start = idx + text[idx..].find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn collect_ids(html: &str, pattern: &Regex, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for cap in pattern.captures_iter(html) {
        if ids.len() >= max {
            break;
        }
        let id = &cap[1];
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn embed_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCKED_EMBED_PHRASES.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddable: Option<bool>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub reason: String,
}

impl VideoCheck {
    fn failed(title: &str, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            title: title.to_string(),
            reason: reason.into(),
            ..Self::default()
        }
    }
}

/// Reads the player response embedded in a watch page.
fn check_from_player(player: &Value, title: &str, author_name: &str, author_url: &str) -> VideoCheck {
    let playability = &player["playabilityStatus"];
    let status = playability["status"].as_str().unwrap_or("UNKNOWN");
    let embeddable = playability["playableInEmbed"].as_bool() != Some(false);
    let ok = status == "OK" && embeddable;
    let reason = playability["reason"]
        .as_str()
        .or_else(|| {
            playability["errorScreen"]["playerErrorMessageRenderer"]["reason"]["simpleText"]
                .as_str()
        })
        .unwrap_or("Video not playable or not embeddable");

    let details = &player["videoDetails"];
    VideoCheck {
        ok,
        status: Some(status.to_string()),
        embeddable: Some(embeddable),
        title: details["title"]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(title)
            .to_string(),
        author_name: Some(if author_name.is_empty() {
            details["author"].as_str().unwrap_or_default().to_string()
        } else {
            author_name.to_string()
        }),
        author_url: Some(author_url.to_string()),
        reason: if ok { String::new() } else { reason.to_string() },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub ok: bool,
    pub query: String,
    pub video_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelShorts {
    pub ok: bool,
    pub handle: String,
    pub video_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Embeddability verdict used by the feed refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedCheck {
    pub ok: bool,
    pub title: String,
}

/// Source of candidate short videos for the quick learning feed.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn channel_short_ids(&self, handle: &str, max: usize) -> Vec<String>;
    async fn search_short_ids(&self, query: &str, max: usize) -> Vec<String>;
    async fn check_embeddable(&self, video_id: &str) -> EmbedCheck;
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(USER_AGENT, BROWSER_UA)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANG)
    }

    async fn oembed(&self, video_id: &str) -> HubResult<(reqwest::StatusCode, Value)> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let resp = self
            .get("https://www.youtube.com/oembed")
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Ok((status, Value::Null));
        }
        Ok((status, resp.json::<Value>().await.unwrap_or_default()))
    }

    /// Full availability check: oEmbed metadata, embed page phrases, then the watch page's
    /// player response when it can be parsed.
    pub async fn check_video(&self, video_id: &str) -> HubResult<VideoCheck> {
        let video_id = video_id.trim();
        if !is_valid_video_id(video_id) {
            return Err(HubError::bad_request("Invalid videoId format"));
        }

        let (status, oembed) = self.oembed(video_id).await?;
        if !status.is_success() {
            return Ok(VideoCheck::failed("", format!("oEmbed {}", status.as_u16())));
        }
        let title = oembed["title"].as_str().unwrap_or_default().to_string();
        let author_name = oembed["author_name"].as_str().unwrap_or_default().to_string();
        let author_url = oembed["author_url"].as_str().unwrap_or_default().to_string();

        let embed = self
            .get(&format!("https://www.youtube.com/embed/{}", video_id))
            .send()
            .await?;
        if !embed.status().is_success() {
            return Ok(VideoCheck::failed(
                &title,
                format!("Embed HTTP {}", embed.status().as_u16()),
            ));
        }
        if embed_blocked(&embed.text().await?) {
            return Ok(VideoCheck::failed(&title, "Video unavailable or embedding disabled"));
        }

        if let Some(check) = self
            .player_check(video_id, &title, &author_name, &author_url)
            .await
        {
            return Ok(check);
        }

        Ok(VideoCheck {
            ok: true,
            status: Some("OK".to_string()),
            embeddable: Some(true),
            title,
            author_name: Some(author_name),
            author_url: Some(author_url),
            reason: String::new(),
        })
    }

    async fn player_check(
        &self,
        video_id: &str,
        title: &str,
        author_name: &str,
        author_url: &str,
    ) -> Option<VideoCheck> {
        let resp = self
            .get(&format!("https://www.youtube.com/watch?v={}", video_id))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let html = resp.text().await.ok()?;
        let raw = extract_json_object_after(&html, "ytInitialPlayerResponse")?;
        let player: Value = serde_json::from_str(raw).ok()?;
        Some(check_from_player(&player, title, author_name, author_url))
    }

    pub async fn search(&self, query: &str, max: usize) -> HubResult<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(HubError::bad_request("Missing query"));
        }
        if query.chars().count() > 200 {
            return Err(HubError::bad_request("Query too long"));
        }

        let resp = self
            .get("https://www.youtube.com/results")
            .query(&[("search_query", query)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(SearchResult {
                ok: false,
                query: query.to_string(),
                video_ids: Vec::new(),
                reason: Some(format!("HTTP {}", resp.status().as_u16())),
            });
        }

        let ids = collect_ids(&resp.text().await?, &WATCH_LINK_RE, max);
        Ok(SearchResult {
            ok: !ids.is_empty(),
            query: query.to_string(),
            video_ids: ids,
            reason: None,
        })
    }

    pub async fn channel_shorts(&self, handle: &str, max: usize) -> HubResult<ChannelShorts> {
        let trimmed = handle.trim();
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if handle.is_empty() {
            return Err(HubError::bad_request("Missing handle"));
        }
        if !is_valid_handle(handle) {
            return Err(HubError::bad_request("Invalid handle"));
        }

        let resp = self
            .get(&format!("https://www.youtube.com/@{}/shorts", handle))
            .query(&[("hl", "en"), ("gl", "US")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(ChannelShorts {
                ok: false,
                handle: handle.to_string(),
                video_ids: Vec::new(),
                reason: Some(format!("HTTP {}", resp.status().as_u16())),
            });
        }

        let ids = collect_ids(&resp.text().await?, &SHORTS_LINK_RE, max);
        Ok(ChannelShorts {
            ok: !ids.is_empty(),
            handle: handle.to_string(),
            video_ids: ids,
            reason: None,
        })
    }

    async fn fetch_shorts(&self, request: reqwest::RequestBuilder, max: usize) -> Vec<String> {
        let resp = match request.send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!("Shorts page returned {}", resp.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Shorts page request failed: {}", e);
                return Vec::new();
            }
        };
        match resp.text().await {
            Ok(html) => collect_ids(&html, &SHORTS_LINK_RE, max),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn channel_short_ids(&self, handle: &str, max: usize) -> Vec<String> {
        let handle = normalize_handle(handle);
        if !is_valid_handle(&handle) {
            tracing::warn!("Skipping invalid channel handle {:?}", handle);
            return Vec::new();
        }
        let request = self.get(&format!("https://www.youtube.com/@{}/shorts", handle));
        self.fetch_shorts(request, max).await
    }

    async fn search_short_ids(&self, query: &str, max: usize) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let request = self.get("https://www.youtube.com/results").query(&[
            ("search_query", query),
            ("sp", SHORTS_SEARCH_FILTER),
            ("hl", "en"),
            ("gl", "US"),
        ]);
        self.fetch_shorts(request, max).await
    }

    async fn check_embeddable(&self, video_id: &str) -> EmbedCheck {
        if !is_valid_video_id(video_id) {
            return EmbedCheck::default();
        }

        let title = match self.oembed(video_id).await {
            Ok((_, oembed)) => oembed["title"].as_str().unwrap_or_default().to_string(),
            Err(_) => String::new(),
        };

        let embed = match self
            .get(&format!("https://www.youtube.com/embed/{}", video_id))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            _ => return EmbedCheck { ok: false, title },
        };
        match embed.text().await {
            Ok(html) if !embed_blocked(&html) => EmbedCheck { ok: true, title },
            _ => EmbedCheck { ok: false, title },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_ids_from_links() {
        assert_eq!(
            video_id_from_url("https://youtu.be/dQw4w9WgXcQ?t=5").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=x").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://m.youtube.com/shorts/abcdefghijk").as_deref(),
            Some("abcdefghijk")
        );
        assert_eq!(
            video_id_from_url("https://youtube.com/embed/abcdefghijkXYZ").as_deref(),
            Some("abcdefghijk")
        );
        assert_eq!(video_id_from_url("https://vimeo.com/123"), None);
        assert_eq!(video_id_from_url("not a url"), None);
    }

    #[test]
    fn handles_are_normalized() {
        assert_eq!(normalize_handle(" @fireship "), "fireship");
        assert_eq!(normalize_handle("https://Google Developers"), "GoogleDevelopers");
        assert!(is_valid_handle("freecodecamp"));
        assert!(!is_valid_handle("a"));
        assert!(!is_valid_handle("bad/handle"));
    }

    #[test]
    fn max_is_clamped() {
        assert_eq!(clamp_max(None, 15, 30), 15);
        assert_eq!(clamp_max(Some("abc"), 15, 30), 15);
        assert_eq!(clamp_max(Some("0"), 15, 30), 15);
        assert_eq!(clamp_max(Some("-5"), 15, 30), 1);
        assert_eq!(clamp_max(Some("500"), 15, 30), 30);
        assert_eq!(clamp_max(Some("7"), 1000, 2000), 7);
    }

    #[test]
    fn balanced_object_extraction() {
        let html = r#"<script>var ytInitialPlayerResponse = {"a":{"b":1},"c":"}"};</script>"#;
        assert_eq!(
            extract_json_object_after(html, "ytInitialPlayerResponse"),
            Some(r#"{"a":{"b":1},"c":"}"#)
        );
        assert_eq!(extract_json_object_after("nothing here", "ytInitialPlayerResponse"), None);
    }

    #[test]
    fn shorts_ids_are_deduplicated_and_capped() {
        let html = r#"href="/shorts/aaaaaaaaaaa" {"url":"\/shorts\/bbbbbbbbbbb"} /shorts/aaaaaaaaaaa /shorts/ccccccccccc"#;
        assert_eq!(
            collect_ids(html, &SHORTS_LINK_RE, 10),
            vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]
        );
        assert_eq!(collect_ids(html, &SHORTS_LINK_RE, 2).len(), 2);
    }

    #[test]
    fn player_response_verdicts() {
        let playable = json!({
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {"title": "Rust in 100 seconds", "author": "Fireship"}
        });
        let check = check_from_player(&playable, "", "", "https://youtube.com/@fireship");
        assert!(check.ok);
        assert_eq!(check.title, "Rust in 100 seconds");
        assert_eq!(check.author_name.as_deref(), Some("Fireship"));
        assert_eq!(check.reason, "");

        let blocked = json!({
            "playabilityStatus": {"status": "OK", "playableInEmbed": false}
        });
        let check = check_from_player(&blocked, "T", "A", "");
        assert!(!check.ok);
        assert_eq!(check.embeddable, Some(false));
        assert_eq!(check.reason, "Video not playable or not embeddable");
    }

    #[test]
    fn blocked_phrases_detected() {
        assert!(embed_blocked("<div>Video Unavailable</div>"));
        assert!(!embed_blocked("<div>player</div>"));
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected_before_fetching() {
        let client = YouTubeClient::new(reqwest::Client::new());
        assert!(matches!(client.check_video("short").await, Err(HubError::BadRequest(_))));
        assert!(matches!(client.search("  ", 5).await, Err(HubError::BadRequest(_))));
        assert!(matches!(
            client.search(&"x".repeat(201), 5).await,
            Err(HubError::BadRequest(_))
        ));
        assert!(matches!(
            client.channel_shorts("@", 5).await,
            Err(HubError::BadRequest(_))
        ));
        assert!(matches!(
            client.channel_shorts("no spaces allowed", 5).await,
            Err(HubError::BadRequest(_))
        ));
    }
}
