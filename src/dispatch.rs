use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::DISCORD_API_BASE;
use crate::reporter;
use crate::types::Embed;

/// Maximum delivery attempts for transient errors.
const MAX_RETRIES: u32 = 3;

/// Base backoff delay for retries (doubles each attempt).
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Guild id → channel id. Last write wins; nothing is persisted.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point a guild's notifications at a channel, returning the previous one.
    pub fn configure(&self, guild_id: &str, channel_id: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(guild_id.to_string(), channel_id.to_string())
    }

    pub fn remove(&self, guild_id: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(guild_id)
    }

    /// `(guild_id, channel_id)` pairs sorted by guild id.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(g, c)| (g.clone(), c.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that can post an embed to a channel.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn send(&self, channel_id: &str, embed: &Embed) -> Result<()>;
}

/// Posts embeds through the Discord REST API with a bot token.
pub struct DiscordSink {
    http: reqwest::Client,
    token: String,
    base: String,
}

impl DiscordSink {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Discord HTTP client")?;
        Ok(Self {
            http,
            token: token.into(),
            base: DISCORD_API_BASE.to_string(),
        })
    }
}

#[async_trait]
impl ChannelSink for DiscordSink {
    async fn send(&self, channel_id: &str, embed: &Embed) -> Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.base);
        self.http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await
            .with_context(|| format!("request to channel {channel_id} failed"))?
            .error_for_status()
            .with_context(|| format!("channel {channel_id} rejected message"))?;
        Ok(())
    }
}

/// Dry-run sink: prints each payload as a JSON line on stdout.
pub struct StdoutSink;

#[async_trait]
impl ChannelSink for StdoutSink {
    async fn send(&self, channel_id: &str, embed: &Embed) -> Result<()> {
        reporter::report_embed(channel_id, embed);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

/// Outcome of one delivery attempt sequence to one destination.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub guild_id: String,
    pub channel_id: String,
    pub status: DeliveryStatus,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub results: Vec<DeliveryResult>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.count(DeliveryStatus::Delivered)
    }

    pub fn failed(&self) -> usize {
        self.count(DeliveryStatus::Failed)
    }

    fn count(&self, status: DeliveryStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Fans an embed out to every registered destination.
pub struct Dispatcher {
    registry: Arc<DestinationRegistry>,
    sink: Box<dyn ChannelSink>,
    max_retries: u32,
    base_backoff: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<DestinationRegistry>, sink: Box<dyn ChannelSink>) -> Self {
        Self {
            registry,
            sink,
            max_retries: MAX_RETRIES,
            base_backoff: BASE_BACKOFF,
        }
    }

    /// Override the retry policy for transient delivery errors.
    pub fn with_retry(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_backoff = base_backoff;
        self
    }

    /// Deliver to every destination independently.
    ///
    /// A failing destination is logged and reported; it never blocks or
    /// fails delivery to the others.
    pub async fn broadcast(&self, embed: &Embed) -> DeliveryReport {
        let destinations = self.registry.snapshot();
        if destinations.is_empty() {
            warn!("No destinations configured, dropping \"{}\"", embed.title);
            return DeliveryReport::default();
        }

        let results = join_all(
            destinations
                .into_iter()
                .map(|(guild_id, channel_id)| self.deliver(guild_id, channel_id, embed)),
        )
        .await;

        let report = DeliveryReport { results };
        info!(
            "Broadcast \"{}\": {} delivered, {} failed",
            embed.title,
            report.delivered(),
            report.failed()
        );
        report
    }

    async fn deliver(&self, guild_id: String, channel_id: String, embed: &Embed) -> DeliveryResult {
        match self.send_with_retry(&channel_id, embed).await {
            Ok(()) => DeliveryResult {
                guild_id,
                channel_id,
                status: DeliveryStatus::Delivered,
                error_msg: None,
            },
            Err(e) => {
                warn!("Delivery to guild {guild_id} channel {channel_id} failed: {e:#}");
                DeliveryResult {
                    guild_id,
                    channel_id,
                    status: DeliveryStatus::Failed,
                    error_msg: Some(format!("{e:#}")),
                }
            }
        }
    }

    async fn send_with_retry(&self, channel_id: &str, embed: &Embed) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.sink.send(channel_id, embed).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let err_str = format!("{e:#}");
                    attempt += 1;
                    if !is_transient(&e) || attempt >= self.max_retries {
                        return Err(e);
                    }
                    let delay = self.base_backoff * 2u32.pow(attempt - 1);
                    warn!(
                        "Transient error posting to {channel_id} (attempt {attempt}/{}): {err_str}, retrying in {delay:?}",
                        self.max_retries,
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Classify a delivery error. HTTP errors are judged by status code so ids
/// embedded in the request URL cannot trip the message heuristics.
fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(http) = err.downcast_ref::<reqwest::Error>() {
        return match http.status() {
            Some(status) => status.as_u16() == 429 || status.is_server_error(),
            None => http.is_timeout() || http.is_connect(),
        };
    }
    is_transient_error(&format!("{err:#}"))
}

/// Check if an error message indicates a transient/retryable failure.
fn is_transient_error(err_str: &str) -> bool {
    let lower = err_str.to_lowercase();
    lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("internal server error")
        || lower.contains("bad gateway")
        || lower.contains("service unavailable")
        || lower.contains("gateway timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
}
