//! Rate-limited client for the upstream match API
//!
//! Every call:
//! 1. waits for the next pacing slot (cancellable)
//! 2. reads the current key from the shared `CredentialHandle`
//! 3. races the request against the shared cancellation token
//! 4. classifies the response (see `error::classify_status`)
//!
//! 429 responses are retried in place after the server-specified delay;
//! everything else is returned to the caller, who decides whether to skip.

use super::error::{classify_status, parse_retry_after, ApiError, ResponseClass};
use super::limiter::RateLimiter;
use super::types::{
    solo_queue_entry, AccountDto, LeagueEntryDto, MatchDto, PurchaseEvent, RankedEntry, TimelineDto,
};
use super::{CredentialValidator, MatchSource, Validity};
use crate::key_core::CredentialHandle;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const RIOT_TOKEN_HEADER: &str = "X-Riot-Token";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Regional routing host for account and match endpoints
    pub regional_base: String,
    /// Platform host for league and status endpoints
    pub platform_base: String,
    pub request_interval: Duration,
    pub default_retry_wait: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn for_region(region: &str, platform: &str) -> Self {
        Self {
            regional_base: format!("https://{}.api.riotgames.com", region),
            platform_base: format!("https://{}.api.riotgames.com", platform),
            request_interval: Duration::from_millis(1200),
            default_retry_wait: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RiotClient {
    http: Client,
    credential: CredentialHandle,
    limiter: Mutex<RateLimiter>,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl RiotClient {
    pub fn new(
        config: ClientConfig,
        credential: CredentialHandle,
        cancel: CancellationToken,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("riftstat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            credential,
            limiter: Mutex::new(RateLimiter::new(config.request_interval)),
            config,
            cancel,
        })
    }

    fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(base).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("{} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn pace(&self) -> Result<(), ApiError> {
        let mut limiter = self.limiter.lock().await;
        limiter.acquire(&self.cancel).await
    }

    /// GET a JSON resource, retrying in place on 429
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        loop {
            self.pace().await?;
            let key = self.credential.current().await;

            let request = self
                .http
                .get(url.clone())
                .header(RIOT_TOKEN_HEADER, key)
                .timeout(self.config.request_timeout);

            let response = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                result = request.send() => result.map_err(|e| ApiError::Network(e.to_string()))?,
            };

            let status = response.status().as_u16();
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );

            match classify_status(status, retry_after, self.config.default_retry_wait) {
                ResponseClass::Success => {
                    return tokio::select! {
                        _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
                        body = response.json::<T>() => body.map_err(|e| ApiError::Decode(e.to_string())),
                    };
                }
                ResponseClass::RateLimited(wait) => {
                    log::warn!("⏳ Rate limited on {} - retrying in {}s", url.path(), wait.as_secs());
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = sleep(wait) => {}
                    }
                }
                ResponseClass::Failure(err) => {
                    log::debug!("Request {} failed with status {}", url.path(), status);
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl MatchSource for RiotClient {
    async fn resolve_account(&self, name: &str, tag: &str) -> Result<String, ApiError> {
        let url = Self::endpoint(
            &self.config.regional_base,
            &["riot", "account", "v1", "accounts", "by-riot-id", name, tag],
        )?;
        let account: AccountDto = self.get_json(url).await?;
        Ok(account.puuid)
    }

    async fn list_recent_match_ids(
        &self,
        puuid: &str,
        count: u32,
        queue: u32,
    ) -> Result<Vec<String>, ApiError> {
        let mut url = Self::endpoint(
            &self.config.regional_base,
            &["lol", "match", "v5", "matches", "by-puuid", puuid, "ids"],
        )?;
        url.query_pairs_mut()
            .append_pair("queue", &queue.to_string())
            .append_pair("start", "0")
            .append_pair("count", &count.to_string());
        self.get_json(url).await
    }

    async fn fetch_match(&self, match_id: &str) -> Result<MatchDto, ApiError> {
        let url = Self::endpoint(&self.config.regional_base, &["lol", "match", "v5", "matches", match_id])?;
        self.get_json(url).await
    }

    async fn fetch_timeline(&self, match_id: &str) -> Result<Vec<PurchaseEvent>, ApiError> {
        let url = Self::endpoint(
            &self.config.regional_base,
            &["lol", "match", "v5", "matches", match_id, "timeline"],
        )?;
        let timeline: TimelineDto = self.get_json(url).await?;
        Ok(timeline.purchases())
    }

    async fn fetch_rank(&self, puuid: &str) -> Result<Option<RankedEntry>, ApiError> {
        let url = Self::endpoint(
            &self.config.platform_base,
            &["lol", "league", "v4", "entries", "by-puuid", puuid],
        )?;
        let entries: Vec<LeagueEntryDto> = self.get_json(url).await?;
        Ok(solo_queue_entry(&entries))
    }
}

#[async_trait]
impl CredentialValidator for RiotClient {
    /// Probe the platform status endpoint with a candidate key.
    ///
    /// Single attempt, no retry: 2xx = valid, 401/403 = invalid, anything
    /// else (5xx, 429, transport error, cancellation) = indeterminate.
    async fn validate_credential(&self, key: &str) -> Validity {
        let url = match Self::endpoint(&self.config.platform_base, &["lol", "status", "v4", "platform-data"]) {
            Ok(url) => url,
            Err(e) => {
                log::error!("❌ Cannot build validation request: {}", e);
                return Validity::Indeterminate;
            }
        };

        if self.pace().await.is_err() {
            return Validity::Indeterminate;
        }

        let request = self
            .http
            .get(url)
            .header(RIOT_TOKEN_HEADER, key)
            .timeout(self.config.request_timeout);

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Validity::Indeterminate,
            result = request.send() => result,
        };

        match result {
            Ok(response) => Validity::from_status(response.status().as_u16()),
            Err(e) => {
                log::warn!("⚠️  Key validation request failed: {}", e);
                Validity::Indeterminate
            }
        }
    }
}
