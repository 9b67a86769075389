//! Key lifecycle: Active → Exhausted → AwaitingReplacement → Active
//!
//! The manager is the only writer of the shared `CredentialHandle`. It is
//! entered once per rejection: the crawl pass stops on the first 403, so no
//! further upstream calls are issued until a validated key is swapped in.

use super::channel::{Notification, OperatorChannel};
use super::credential::{mask_key, CredentialHandle, KeyState};
use super::token::KeyEnvelope;
use crate::api_core::{CredentialValidator, Validity};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct KeyLifecycleConfig {
    pub poll_interval: Duration,
    pub envelope: KeyEnvelope,
}

impl Default for KeyLifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            envelope: KeyEnvelope::default(),
        }
    }
}

/// Progress figures reported when the key runs out
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub matches_collected: u64,
    pub runtime: Duration,
    pub since_last_reduce: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// A valid key is installed and the state is Active again
    Recovered,
    Cancelled,
}

pub struct KeyLifecycleManager {
    handle: CredentialHandle,
    validator: Arc<dyn CredentialValidator>,
    channel: Option<Arc<dyn OperatorChannel>>,
    config: KeyLifecycleConfig,
    state: KeyState,
    recoveries: u64,
}

impl KeyLifecycleManager {
    pub fn new(
        handle: CredentialHandle,
        validator: Arc<dyn CredentialValidator>,
        channel: Option<Arc<dyn OperatorChannel>>,
        config: KeyLifecycleConfig,
    ) -> Self {
        Self {
            handle,
            validator,
            channel,
            config,
            state: KeyState::Active,
            recoveries: 0,
        }
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Completed or attempted recoveries since startup
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    pub async fn notify(&self, notification: Notification) {
        let Some(channel) = &self.channel else {
            return;
        };
        if let Err(e) = channel.send(&notification).await {
            log::warn!("⚠️  Operator notification failed: {}", e);
        }
    }

    pub async fn notify_session_started(&self, summary: String) {
        self.notify(Notification::SessionStarted { summary }).await;
    }

    /// Validate the configured key before the first pass.
    ///
    /// An indeterminate answer (network or server trouble) keeps the key
    /// Active; the crawl will find out soon enough if it is really bad.
    pub async fn startup_check(&mut self, cancel: &CancellationToken) -> RecoveryOutcome {
        let key = self.handle.current().await;
        match self.validator.validate_credential(&key).await {
            Validity::Valid => {
                log::info!("🔑 API key {} validated", mask_key(&key));
                RecoveryOutcome::Recovered
            }
            Validity::Indeterminate => {
                if cancel.is_cancelled() {
                    return RecoveryOutcome::Cancelled;
                }
                log::warn!("⚠️  Could not validate API key {} (upstream unreachable), continuing", mask_key(&key));
                RecoveryOutcome::Recovered
            }
            Validity::Invalid => {
                log::error!("🔑 API key {} rejected at startup", mask_key(&key));
                self.recover(RunStats::default(), cancel).await
            }
        }
    }

    /// Run the recovery protocol until a valid key is installed or the
    /// run is cancelled.
    pub async fn recover(&mut self, stats: RunStats, cancel: &CancellationToken) -> RecoveryOutcome {
        self.state = KeyState::Exhausted;
        self.recoveries += 1;
        let rejected_key = self.handle.current().await;
        log::warn!(
            "🔑 Key {} exhausted after {} matches",
            mask_key(&rejected_key),
            stats.matches_collected
        );

        self.notify(Notification::KeyExhausted {
            matches_collected: stats.matches_collected,
            runtime: stats.runtime,
            since_last_reduce: stats.since_last_reduce,
        })
        .await;
        self.state = KeyState::AwaitingReplacement;

        let Some(channel) = self.channel.clone() else {
            log::error!("❌ No recovery channel configured; waiting for shutdown (set DISCORD_BOT_TOKEN and DISCORD_CHANNEL_ID)");
            cancel.cancelled().await;
            return RecoveryOutcome::Cancelled;
        };

        let mut rejected: HashSet<String> = HashSet::new();
        rejected.insert(rejected_key);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return RecoveryOutcome::Cancelled,
                _ = sleep(self.config.poll_interval) => {}
            }

            let messages = match channel.poll_messages().await {
                Ok(messages) => messages,
                Err(e) => {
                    log::warn!("⚠️  Polling recovery channel failed: {}", e);
                    continue;
                }
            };

            let candidates = messages.iter().flat_map(|m| self.config.envelope.scan(m));
            for candidate in candidates.collect::<Vec<_>>() {
                if rejected.contains(&candidate) {
                    continue;
                }
                if cancel.is_cancelled() {
                    return RecoveryOutcome::Cancelled;
                }

                let masked = mask_key(&candidate);
                match self.validator.validate_credential(&candidate).await {
                    Validity::Valid => {
                        self.handle.swap(candidate).await;
                        self.state = KeyState::Active;
                        log::info!("✅ Key {} validated and installed", masked);
                        self.notify(Notification::KeyReplaced { masked_key: masked }).await;
                        return RecoveryOutcome::Recovered;
                    }
                    Validity::Invalid => {
                        log::warn!("⚠️  Candidate key {} rejected", masked);
                        rejected.insert(candidate);
                        self.notify(Notification::CandidateRejected {
                            masked_key: masked,
                            reason: "rejected by upstream (invalid or expired)".to_string(),
                        })
                        .await;
                    }
                    Validity::Indeterminate => {
                        log::warn!("⚠️  Candidate key {} could not be verified", masked);
                        self.notify(Notification::CandidateRejected {
                            masked_key: masked,
                            reason: "could not be verified (network or server error), please resend".to_string(),
                        })
                        .await;
                    }
                }
            }
        }
    }
}
