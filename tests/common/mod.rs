//! In-memory stand-ins for the upstream API and the operator channel

#![allow(dead_code)]

use async_trait::async_trait;
use riftstat::api_core::types::{MatchInfo, MatchMetadata, ParticipantDto};
use riftstat::api_core::{
    ApiError, CredentialValidator, MatchDto, MatchSource, PurchaseEvent, RankedEntry, Validity,
};
use riftstat::key_core::{ChannelError, CredentialHandle, Notification, OperatorChannel};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const OLD_KEY: &str = "RGAPI-00000000-0000-0000-0000-000000000000";
pub const NEW_KEY: &str = "RGAPI-22222222-2222-2222-2222-222222222222";

const POSITIONS: [&str; 5] = ["TOP", "JUNGLE", "MIDDLE", "BOTTOM", "UTILITY"];

/// Ten players, blue side (100) wins, champion ids 10..20 by slot
pub fn ranked_match(match_id: &str, game_version: &str) -> MatchDto {
    let participants = (0..10u32)
        .map(|i| ParticipantDto {
            puuid: format!("{}-p{}", match_id, i),
            participant_id: i + 1,
            team_id: if i < 5 { 100 } else { 200 },
            champion_id: 10 + i,
            champion_name: format!("Champion{}", 10 + i),
            team_position: POSITIONS[(i % 5) as usize].to_string(),
            win: i < 5,
            item0: 3078,
            item1: 3142,
            item2: 0,
            item3: 0,
            item4: 0,
            item5: 3340,
        })
        .collect();

    MatchDto {
        metadata: MatchMetadata {
            match_id: match_id.to_string(),
            participants: Vec::new(),
        },
        info: MatchInfo {
            game_creation: 1_700_000_000_000,
            game_duration: 1_750,
            game_version: game_version.to_string(),
            queue_id: 420,
            participants,
        },
    }
}

/// Upstream stand-in. Requests made with `rejected_key` fail with 403;
/// every call is logged with the key it carried.
pub struct FakeUpstream {
    pub credential: CredentialHandle,
    pub rejected_key: Option<String>,
    pub seed_matches: Vec<String>,
    pub cancel_on_match: Option<(String, CancellationToken)>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeUpstream {
    pub fn new(credential: CredentialHandle, seed_matches: &[&str]) -> Self {
        Self {
            credential,
            rejected_key: None,
            seed_matches: seed_matches.iter().map(|s| s.to_string()).collect(),
            cancel_on_match: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with_key(&self, key: &str) -> usize {
        self.calls().iter().filter(|(k, _)| k == key).count()
    }

    async fn enter(&self, call: String) -> Result<(), ApiError> {
        let key = self.credential.current().await;
        self.calls.lock().unwrap().push((key.clone(), call));
        match &self.rejected_key {
            Some(rejected) if *rejected == key => Err(ApiError::CredentialInvalid),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MatchSource for FakeUpstream {
    async fn resolve_account(&self, name: &str, tag: &str) -> Result<String, ApiError> {
        self.enter(format!("account:{}#{}", name, tag)).await?;
        Ok("seed-puuid".to_string())
    }

    async fn list_recent_match_ids(&self, puuid: &str, _count: u32, _queue: u32) -> Result<Vec<String>, ApiError> {
        self.enter(format!("ids:{}", puuid)).await?;
        if puuid == "seed-puuid" {
            Ok(self.seed_matches.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn fetch_match(&self, match_id: &str) -> Result<MatchDto, ApiError> {
        self.enter(format!("match:{}", match_id)).await?;
        if let Some((trigger, cancel)) = &self.cancel_on_match {
            if trigger == match_id {
                cancel.cancel();
            }
        }
        Ok(ranked_match(match_id, "15.24.734.1"))
    }

    async fn fetch_timeline(&self, match_id: &str) -> Result<Vec<PurchaseEvent>, ApiError> {
        self.enter(format!("timeline:{}", match_id)).await?;
        Ok(Vec::new())
    }

    async fn fetch_rank(&self, puuid: &str) -> Result<Option<RankedEntry>, ApiError> {
        self.enter(format!("rank:{}", puuid)).await?;
        Ok(None)
    }
}

/// Accepts exactly the listed keys
pub struct FakeValidator {
    pub valid: Vec<String>,
    pub checked: Mutex<Vec<String>>,
}

impl FakeValidator {
    pub fn accepting(keys: &[&str]) -> Self {
        Self {
            valid: keys.iter().map(|k| k.to_string()).collect(),
            checked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CredentialValidator for FakeValidator {
    async fn validate_credential(&self, key: &str) -> Validity {
        self.checked.lock().unwrap().push(key.to_string());
        if self.valid.iter().any(|k| k == key) {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}

/// Scripted inbox: each poll returns the next batch of messages
#[derive(Default)]
pub struct FakeChannel {
    pub inbox: Mutex<VecDeque<Vec<String>>>,
    pub sent: Mutex<Vec<Notification>>,
}

impl FakeChannel {
    pub fn with_replies(replies: Vec<Vec<String>>) -> Self {
        Self {
            inbox: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorChannel for FakeChannel {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn poll_messages(&self) -> Result<Vec<String>, ChannelError> {
        Ok(self.inbox.lock().unwrap().pop_front().unwrap_or_default())
    }
}
