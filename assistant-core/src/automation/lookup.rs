//! Resolve "open spotify" / "play despacito" into a concrete URL.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::realtime::{DuckDuckGoSearch, WebSearch, USER_AGENT};

type LookupFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

/// Finds the URL to open when no local action applies.
pub trait LinkLookup: Send + Sync {
    /// Top web result for a name, e.g. an app's homepage.
    fn first_web_result<'a>(&'a self, query: &'a str) -> LookupFuture<'a>;

    /// Watch URL of the first YouTube search result.
    fn first_youtube_video<'a>(&'a self, query: &'a str) -> LookupFuture<'a>;
}

pub struct HttpLookup {
    client: reqwest::Client,
    search: DuckDuckGoSearch,
    video_re: Regex,
}

impl HttpLookup {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent(USER_AGENT)
                .build()?,
            search: DuckDuckGoSearch::new()?,
            video_re: Regex::new(r#""videoId":"([A-Za-z0-9_-]{11})""#)?,
        })
    }

    /// Pull the first `watch?v=<id>` out of a YouTube results page.
    pub fn extract_first_video(&self, html: &str) -> Option<String> {
        self.video_re
            .captures(html)
            .map(|c| format!("https://www.youtube.com/watch?v={}", &c[1]))
    }
}

impl LinkLookup for HttpLookup {
    fn first_web_result<'a>(&'a self, query: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let hits = self.search.search(query, 1).await?;
            Ok(hits.into_iter().next().map(|h| h.url).filter(|u| !u.is_empty()))
        })
    }

    fn first_youtube_video<'a>(&'a self, query: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let url = super::youtube_search_url(query);
            let resp = self.client.get(&url).send().await?;
            if !resp.status().is_success() {
                anyhow::bail!("YouTube search failed with status {}", resp.status());
            }
            let html = resp.text().await?;
            let found = self.extract_first_video(&html);
            debug!(query = %query, found = ?found, "YouTube lookup");
            Ok(found)
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_video() {
        let lookup = HttpLookup::new().unwrap();
        let html = r#"..."videoId":"kJQP7kiw5Fk","thumbnail"...{"videoId":"aaaaaaaaaaa"}"#;
        assert_eq!(
            lookup.extract_first_video(html).as_deref(),
            Some("https://www.youtube.com/watch?v=kJQP7kiw5Fk")
        );
        assert!(lookup.extract_first_video("<html>no results</html>").is_none());
    }
}
