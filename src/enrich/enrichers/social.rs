//! Social media enricher.
//!
//! Discovers a team's social profiles by harvesting links from the
//! official website. Follower counts are only filled where an official
//! platform API is configured (YouTube Data API); logged-out profile pages
//! are not scraped.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::enrich::enrichers::BROWSER_USER_AGENT;
use crate::enrich::{EnrichOutcome, Enricher, EnricherConfig};
use crate::models::{SocialHandle, TeamRecord};

const YOUTUBE_CHANNELS_URL: &str = "https://www.googleapis.com/youtube/v3/channels";

/// Host suffix -> platform key. Ordered so more specific hosts win.
const PLATFORM_HOSTS: &[(&str, &str)] = &[
    ("twitter.com", "x"),
    ("x.com", "x"),
    ("instagram.com", "instagram"),
    ("facebook.com", "facebook"),
    ("tiktok.com", "tiktok"),
    ("youtube.com", "youtube"),
];

/// Path segments that are platform plumbing, not profile handles.
const NON_HANDLE_SEGMENTS: &[&str] = &[
    "intent", "share", "sharer", "sharer.php", "hashtag", "plugins", "embed", "watch",
    "playlist", "shorts", "policies", "privacy", "login", "home", "search",
];

/// Collects social handles and (where APIs allow) follower counts.
pub struct SocialEnricher {
    config: EnricherConfig,
    client: RwLock<Option<Client>>,
    youtube_api_key: Option<String>,
}

impl SocialEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        let youtube_api_key = config.api_key_or_env("youtube", "YOUTUBE_API_KEY");
        Self {
            config,
            client: RwLock::new(None),
            youtube_api_key,
        }
    }

    fn client(&self) -> Option<Client> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let Some(client) = self.client() else {
            anyhow::bail!("HTTP client not initialized");
        };
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("error status from {url}"))?;
        Ok(response.text().await?)
    }

    /// Look up a YouTube channel's subscriber count via the Data API.
    async fn fetch_youtube_subscribers(&self, channel_id: &str) -> Result<Option<u64>> {
        let (Some(client), Some(key)) = (self.client(), self.youtube_api_key.as_deref()) else {
            return Ok(None);
        };

        let response = client
            .get(YOUTUBE_CHANNELS_URL)
            .query(&[("part", "statistics"), ("id", channel_id), ("key", key)])
            .send()
            .await
            .context("YouTube API request failed")?
            .error_for_status()
            .context("YouTube API returned an error status")?;

        let body: Value = response.json().await?;
        let count = body["items"][0]["statistics"]["subscriberCount"]
            .as_str()
            .and_then(|raw| raw.parse::<u64>().ok());
        Ok(count)
    }
}

/// Harvest social profile links from a page. Parsing is fully synchronous
/// so the non-`Send` DOM never crosses an await point.
fn extract_social_handles(html: &str) -> Vec<SocialHandle> {
    let document = Html::parse_document(html);
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen_platforms: HashMap<String, SocialHandle> = HashMap::new();

    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(handle) = handle_from_url(href) else {
            continue;
        };
        // First link per platform wins (headers/footers list the canonical
        // profile before inline share links)
        seen_platforms.entry(handle.platform.clone()).or_insert(handle);
    }

    let mut handles: Vec<SocialHandle> = seen_platforms.into_values().collect();
    handles.sort_by(|a, b| a.platform.cmp(&b.platform));
    handles
}

/// Parse a profile URL into a handle, rejecting share/intent plumbing.
fn handle_from_url(href: &str) -> Option<SocialHandle> {
    let url = Url::parse(href).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").to_string();

    let platform = PLATFORM_HOSTS
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")))
        .map(|(_, platform)| *platform)?;

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;

    if NON_HANDLE_SEGMENTS.contains(&first.to_ascii_lowercase().as_str()) {
        return None;
    }

    // YouTube channel ids are the stable identifier; @handles are cosmetic
    if platform == "youtube" {
        if first == "channel" {
            let channel_id = segments.next()?.to_string();
            return Some(SocialHandle {
                platform: platform.to_string(),
                handle: channel_id.clone(),
                url: Some(href.to_string()),
                unique_id: Some(channel_id),
            });
        }
        let handle = first.trim_start_matches('@');
        if handle.is_empty() {
            return None;
        }
        return Some(SocialHandle {
            platform: platform.to_string(),
            handle: handle.to_string(),
            url: Some(href.to_string()),
            unique_id: None,
        });
    }

    let handle = first.trim_start_matches('@').trim_end_matches('/');
    if handle.is_empty() {
        return None;
    }

    Some(SocialHandle {
        platform: platform.to_string(),
        handle: handle.to_string(),
        url: Some(href.to_string()),
        unique_id: None,
    })
}

#[async_trait]
impl Enricher for SocialEnricher {
    fn id(&self) -> &'static str {
        "social"
    }

    fn name(&self) -> &'static str {
        "Social Media Enricher"
    }

    fn description(&self) -> &'static str {
        "Collects social media handles from team websites and subscriber counts where platform APIs are configured"
    }

    fn fields_added(&self) -> &'static [&'static str] {
        &[
            "social_handles",
            "followers_x",
            "followers_instagram",
            "followers_facebook",
            "followers_tiktok",
            "subscribers_youtube",
        ]
    }

    fn config(&self) -> &EnricherConfig {
        &self.config
    }

    async fn pre_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build social HTTP client")?;
        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
        Ok(())
    }

    async fn post_enrich(&self, _records: &[TeamRecord]) -> Result<()> {
        if let Ok(mut guard) = self.client.write() {
            *guard = None;
        }
        Ok(())
    }

    async fn enrich_one(&self, record: &mut TeamRecord) -> Result<EnrichOutcome> {
        if record.official_url.is_empty() {
            return Ok(EnrichOutcome::NoChange);
        }

        let mut written = Vec::new();

        if record.social_handles.is_none() {
            let html = self.fetch_page(&record.official_url).await?;
            let handles = extract_social_handles(&html);
            debug!(team = %record.name, count = handles.len(), "social handles found");

            let found_any = !handles.is_empty();
            // An explicit empty list records "checked, nothing found"
            record.social_handles = Some(handles);
            if found_any {
                written.push("social_handles".to_string());
            }
        }

        if record.subscribers_youtube.is_none() {
            let channel_id = record.social_handles.as_ref().and_then(|handles| {
                handles
                    .iter()
                    .find(|handle| handle.platform == "youtube")
                    .and_then(|handle| handle.unique_id.clone())
            });
            if let Some(channel_id) = channel_id {
                if let Some(subscribers) = self.fetch_youtube_subscribers(&channel_id).await? {
                    record.subscribers_youtube = Some(subscribers);
                    written.push("subscribers_youtube".to_string());
                }
            }
        }

        if written.is_empty() {
            Ok(EnrichOutcome::NoChange)
        } else {
            Ok(EnrichOutcome::Changed(written))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_from_profile_urls() {
        let handle = handle_from_url("https://x.com/Seahawks").unwrap();
        assert_eq!(handle.platform, "x");
        assert_eq!(handle.handle, "Seahawks");

        let handle = handle_from_url("https://www.instagram.com/seahawks/").unwrap();
        assert_eq!(handle.platform, "instagram");
        assert_eq!(handle.handle, "seahawks");

        let handle = handle_from_url("https://www.tiktok.com/@seahawks").unwrap();
        assert_eq!(handle.platform, "tiktok");
        assert_eq!(handle.handle, "seahawks");
    }

    #[test]
    fn test_youtube_channel_id_is_unique_id() {
        let handle =
            handle_from_url("https://www.youtube.com/channel/UCpm5OjKYtw7vkHZZGzP2O6A").unwrap();
        assert_eq!(handle.platform, "youtube");
        assert_eq!(
            handle.unique_id.as_deref(),
            Some("UCpm5OjKYtw7vkHZZGzP2O6A")
        );

        let handle = handle_from_url("https://www.youtube.com/@seahawks").unwrap();
        assert_eq!(handle.handle, "seahawks");
        assert_eq!(handle.unique_id, None);
    }

    #[test]
    fn test_share_links_rejected() {
        assert!(handle_from_url("https://twitter.com/intent/tweet?text=hi").is_none());
        assert!(handle_from_url("https://www.facebook.com/sharer/sharer.php?u=x").is_none());
        assert!(handle_from_url("https://example.com/news").is_none());
        assert!(handle_from_url("not a url").is_none());
    }

    #[test]
    fn test_extract_dedupes_per_platform() {
        let html = r#"
            <html><body>
              <a href="https://x.com/Seahawks">X</a>
              <a href="https://x.com/SeahawksPR">Other X</a>
              <a href="https://www.instagram.com/seahawks/">IG</a>
              <a href="/tickets">Tickets</a>
            </body></html>
        "#;
        let handles = extract_social_handles(html);
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].platform, "instagram");
        assert_eq!(handles[1].platform, "x");
        assert_eq!(handles[1].handle, "Seahawks");
    }

    #[tokio::test]
    async fn test_empty_official_url_is_nochange() {
        let enricher = SocialEnricher::new(EnricherConfig::default());
        let mut record = TeamRecord::default();
        let outcome = enricher.enrich_one(&mut record).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::NoChange);
        assert_eq!(record.social_handles, None);
    }
}
