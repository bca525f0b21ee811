//! Web-search-augmented answers for questions that need fresh information.
//!
//! Results from a `WebSearch` backend are pasted into the prompt as a system
//! message ahead of the chat history.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::chatbot::persona;
use crate::chatlog::ChatLog;
use crate::llm::{ChatMessage, ChatModel, CompletionRequest};
use crate::text::{answer_modifier, realtime_information};

/// Desktop browser user agent; search pages serve reduced markup otherwise.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Common trait for search backends (dyn-compatible).
pub trait WebSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SearchHit>>> + Send + '_>>;
}

/// Format hits the way the answer prompt expects them.
pub fn format_results(query: &str, hits: &[SearchHit]) -> String {
    let mut out = format!("The search results for '{}' are:\n[start]\n", query);
    for hit in hits {
        out.push_str(&format!(
            "Title: {}\nDescription: {}\n\n",
            hit.title, hit.description
        ));
    }
    out.push_str("[end]");
    out
}

// ---------------------------------------------------------------------------
// DuckDuckGo HTML search
// ---------------------------------------------------------------------------

/// Scrapes the JavaScript-free DuckDuckGo results page.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    link_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

impl DuckDuckGoSearch {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .user_agent(USER_AGENT)
                .build()?,
            link_re: Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)?,
            snippet_re: Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)?,
            tag_re: Regex::new(r"<[^>]+>")?,
        })
    }

    /// Extract hits from a results page. A snippet belongs to the link it
    /// follows, up to the next link.
    pub fn parse_results(&self, html: &str, limit: usize) -> Vec<SearchHit> {
        let links: Vec<_> = self.link_re.captures_iter(html).collect();

        links
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let start = c.get(0).map_or(0, |m| m.end());
                let end = links
                    .get(i + 1)
                    .and_then(|next| next.get(0))
                    .map_or(html.len(), |m| m.start());
                let description = self
                    .snippet_re
                    .captures(&html[start..end])
                    .map(|s| self.clean(&s[1]))
                    .unwrap_or_default();
                SearchHit {
                    title: self.clean(&c[2]),
                    description,
                    url: resolve_redirect(&decode_entities(&c[1])),
                }
            })
            .filter(|hit| !hit.title.is_empty())
            .take(limit)
            .collect()
    }

    fn clean(&self, fragment: &str) -> String {
        let text = self.tag_re.replace_all(fragment, "");
        decode_entities(text.trim())
    }
}

impl WebSearch for DuckDuckGoSearch {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SearchHit>>> + Send + '_>> {
        let query = query.to_string();
        Box::pin(async move {
            let url = url::Url::parse_with_params("https://html.duckduckgo.com/html/", &[("q", &query)])?;
            let resp = self.client.get(url).send().await?;
            if !resp.status().is_success() {
                anyhow::bail!("Search request failed with status {}", resp.status());
            }
            let html = resp.text().await?;
            let hits = self.parse_results(&html, limit);
            debug!(query = %query, hits = hits.len(), "Web search complete");
            Ok(hits)
        })
    }
}

/// DuckDuckGo wraps result links as `//duckduckgo.com/l/?uddg=<encoded>`.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RealtimeEngine {
    model: Arc<dyn ChatModel>,
    model_name: String,
    search: Arc<dyn WebSearch>,
    log: Arc<ChatLog>,
    system: String,
    results: usize,
}

impl RealtimeEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: &str,
        search: Arc<dyn WebSearch>,
        log: Arc<ChatLog>,
        user_name: &str,
        assistant_name: &str,
        results: usize,
    ) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            search,
            log,
            system: persona(user_name, assistant_name),
            results,
        }
    }

    /// Search, then answer with the results in context. The exchange is
    /// appended to the chat history.
    pub async fn answer(&self, query: &str) -> anyhow::Result<String> {
        let hits = match self.search.search(query, self.results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Web search failed, answering without results: {}", e);
                Vec::new()
            }
        };
        info!(query = %query, hits = hits.len(), "Realtime answer");

        let mut history = self.log.load()?;
        history.push(ChatMessage::user(query));

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(self.system.clone()));
        messages.push(ChatMessage::system(format_results(query, &hits)));
        messages.push(ChatMessage::system(realtime_information(&Local::now())));
        messages.extend(history.iter().cloned());

        let request = CompletionRequest::new(&self.model_name, messages).max_tokens(2048);
        let answer = self.model.complete(request).await?;

        history.push(ChatMessage::assistant(answer.clone()));
        self.log.save(&history)?;

        Ok(answer_modifier(&answer))
    }
}
