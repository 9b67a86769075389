//! Upstream match API response structures
//!
//! Only the fields the harvester reads are modelled; everything else in the
//! payloads is ignored by serde.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDto {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_creation: i64,
    pub game_duration: i64,
    pub game_version: String,
    #[serde(default)]
    pub queue_id: u32,
    pub participants: Vec<ParticipantDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub puuid: String,
    pub participant_id: u32,
    pub team_id: u32,
    pub champion_id: u32,
    pub champion_name: String,
    #[serde(default)]
    pub team_position: String,
    pub win: bool,
    #[serde(default)]
    pub item0: u32,
    #[serde(default)]
    pub item1: u32,
    #[serde(default)]
    pub item2: u32,
    #[serde(default)]
    pub item3: u32,
    #[serde(default)]
    pub item4: u32,
    #[serde(default)]
    pub item5: u32,
}

impl ParticipantDto {
    pub fn final_items(&self) -> [u32; 6] {
        [self.item0, self.item1, self.item2, self.item3, self.item4, self.item5]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineDto {
    pub info: TimelineInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineInfo {
    #[serde(default)]
    pub frames: Vec<TimelineFrame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineFrame {
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: i64,
    pub participant_id: Option<u32>,
    pub item_id: Option<u32>,
}

/// A single item purchase extracted from a match timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub participant_id: u32,
    pub item_id: u32,
    pub timestamp: i64,
}

impl TimelineDto {
    /// Flatten all `ITEM_PURCHASED` events in chronological order
    pub fn purchases(&self) -> Vec<PurchaseEvent> {
        let mut purchases: Vec<PurchaseEvent> = self
            .info
            .frames
            .iter()
            .flat_map(|frame| frame.events.iter())
            .filter(|event| event.kind == "ITEM_PURCHASED")
            .filter_map(|event| match (event.participant_id, event.item_id) {
                (Some(participant_id), Some(item_id)) => Some(PurchaseEvent {
                    participant_id,
                    item_id,
                    timestamp: event.timestamp,
                }),
                _ => None,
            })
            .collect();

        // Stable sort keeps same-timestamp purchases in frame order
        purchases.sort_by_key(|p| p.timestamp);
        purchases
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntryDto {
    pub queue_type: String,
    pub tier: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
}

/// Solo-queue standing used by the rank gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub tier: String,
    pub division: String,
}

pub const SOLO_QUEUE: &str = "RANKED_SOLO_5x5";

pub fn solo_queue_entry(entries: &[LeagueEntryDto]) -> Option<RankedEntry> {
    entries
        .iter()
        .find(|entry| entry.queue_type == SOLO_QUEUE)
        .map(|entry| RankedEntry {
            tier: entry.tier.clone(),
            division: entry.rank.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_purchases_in_order() {
        let json = r#"{
            "info": {
                "frames": [
                    {"events": [
                        {"type": "ITEM_PURCHASED", "timestamp": 2000, "participantId": 1, "itemId": 1055},
                        {"type": "WARD_PLACED", "timestamp": 2100, "creatorId": 1},
                        {"type": "ITEM_PURCHASED", "timestamp": 1500, "participantId": 2, "itemId": 1056}
                    ]},
                    {"events": [
                        {"type": "ITEM_PURCHASED", "timestamp": 600000, "participantId": 1, "itemId": 3031},
                        {"type": "ITEM_SOLD", "timestamp": 600500, "participantId": 1, "itemId": 1055}
                    ]}
                ]
            }
        }"#;

        let timeline: TimelineDto = serde_json::from_str(json).unwrap();
        let purchases = timeline.purchases();

        assert_eq!(purchases.len(), 3);
        assert_eq!(purchases[0].item_id, 1056);
        assert_eq!(purchases[1].item_id, 1055);
        assert_eq!(purchases[2].item_id, 3031);
    }

    #[test]
    fn test_solo_queue_entry_selection() {
        let entries = vec![
            LeagueEntryDto {
                queue_type: "RANKED_FLEX_SR".to_string(),
                tier: "GOLD".to_string(),
                rank: "I".to_string(),
                wins: 1,
                losses: 1,
            },
            LeagueEntryDto {
                queue_type: SOLO_QUEUE.to_string(),
                tier: "EMERALD".to_string(),
                rank: "IV".to_string(),
                wins: 50,
                losses: 45,
            },
        ];

        let entry = solo_queue_entry(&entries).unwrap();
        assert_eq!(entry.tier, "EMERALD");
        assert_eq!(entry.division, "IV");
        assert!(solo_queue_entry(&[]).is_none());
    }
}
