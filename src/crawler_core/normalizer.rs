//! Match payload → per-participant records

use super::items::participant_build_order;
use crate::api_core::{MatchDto, PurchaseEvent};
use crate::record::{MatchParticipantRecord, Role};

/// Build one record per participant with a known position.
///
/// `purchases` is `Some` only when the timeline was sampled for this match;
/// otherwise build orders are left empty and `timeline_sampled` is false.
pub fn records_from_match(
    match_dto: &MatchDto,
    purchases: Option<&[PurchaseEvent]>,
) -> Vec<MatchParticipantRecord> {
    let info = &match_dto.info;

    info.participants
        .iter()
        .filter_map(|p| {
            let Some(position) = Role::from_api(&p.team_position) else {
                log::debug!(
                    "Skipping participant without position (match: {}, champion: {})",
                    match_dto.metadata.match_id,
                    p.champion_name
                );
                return None;
            };

            Some(MatchParticipantRecord {
                match_id: match_dto.metadata.match_id.clone(),
                game_version: info.game_version.clone(),
                game_duration: info.game_duration,
                game_creation: info.game_creation,
                puuid: p.puuid.clone(),
                team_id: p.team_id,
                champion_id: p.champion_id,
                champion_name: p.champion_name.clone(),
                position,
                win: p.win,
                items: p.final_items(),
                build_order: purchases
                    .map(|events| participant_build_order(events, p.participant_id))
                    .unwrap_or_default(),
                timeline_sampled: purchases.is_some(),
            })
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_match;
    use super::*;

    #[test]
    fn test_one_record_per_positioned_participant() {
        let mut dto = sample_match("NA1_42", "15.24.734.1");
        dto.info.participants[3].team_position = String::new();

        let records = records_from_match(&dto, None);

        assert_eq!(records.len(), 9);
        assert!(records.iter().all(|r| r.match_id == "NA1_42"));
        assert!(records.iter().all(|r| !r.timeline_sampled && r.build_order.is_empty()));
        assert_eq!(records[0].items, [3078, 3006, 2003, 0, 3142, 1036]);
    }

    #[test]
    fn test_sampled_timeline_feeds_build_order() {
        let dto = sample_match("NA1_43", "15.24.734.1");
        let purchases = vec![
            PurchaseEvent { participant_id: 1, item_id: 1036, timestamp: 10 },
            PurchaseEvent { participant_id: 1, item_id: 3078, timestamp: 20 },
            PurchaseEvent { participant_id: 1, item_id: 3078, timestamp: 30 },
            PurchaseEvent { participant_id: 1, item_id: 2003, timestamp: 40 },
            PurchaseEvent { participant_id: 1, item_id: 3142, timestamp: 50 },
        ];

        let records = records_from_match(&dto, Some(&purchases));

        assert_eq!(records[0].build_order, vec![3078, 3142]);
        assert!(records[0].timeline_sampled);
        assert!(records[1].build_order.is_empty());
        assert!(records[1].timeline_sampled);
    }
}
