//! Match participant records - the unit written to every storage tier
//!
//! One `MatchParticipantRecord` is emitted per participant per match and
//! serialized as a single JSON line. Records are never mutated after they
//! are appended to the hot file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lane assignment as reported by the match API (`teamPosition`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Top,
    Jungle,
    Middle,
    Bottom,
    Utility,
}

impl Role {
    /// Parse the upstream position string. Empty or unknown positions
    /// (remakes, non-standard queues) return `None`.
    pub fn from_api(position: &str) -> Option<Self> {
        match position {
            "TOP" => Some(Role::Top),
            "JUNGLE" => Some(Role::Jungle),
            "MIDDLE" => Some(Role::Middle),
            "BOTTOM" => Some(Role::Bottom),
            "UTILITY" => Some(Role::Utility),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Top => "TOP",
            Role::Jungle => "JUNGLE",
            Role::Middle => "MIDDLE",
            Role::Bottom => "BOTTOM",
            Role::Utility => "UTILITY",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParticipantRecord {
    pub match_id: String,
    /// Full client version string, e.g. `15.24.734.1234`
    pub game_version: String,
    /// Seconds
    pub game_duration: i64,
    /// Epoch milliseconds
    pub game_creation: i64,
    pub puuid: String,
    pub team_id: u32,
    pub champion_id: u32,
    pub champion_name: String,
    pub position: Role,
    pub win: bool,
    /// Final inventory slots item0..item5 (0 = empty slot)
    pub items: [u32; 6],
    /// Completed-item purchases in first-occurrence order
    pub build_order: Vec<u32>,
    #[serde(default)]
    pub timeline_sampled: bool,
}

impl MatchParticipantRecord {
    pub fn patch(&self) -> String {
        normalize_patch(&self.game_version)
    }
}

/// Reduce a full version string to `major.minor`.
///
/// `15.24.734` and `15.24.999.1` both normalize to `15.24`. Strings with a
/// single component are returned trimmed and unchanged.
pub fn normalize_patch(version: &str) -> String {
    let mut parts = version.trim().split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{}.{}", major, minor),
        (Some(major), None) => major.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_patch() {
        assert_eq!(normalize_patch("15.24.734"), "15.24");
        assert_eq!(normalize_patch("15.24.701"), normalize_patch("15.24.999"));
        assert_eq!(normalize_patch("14.1.555.9000"), "14.1");
        assert_eq!(normalize_patch("15"), "15");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_api("UTILITY"), Some(Role::Utility));
        assert_eq!(Role::from_api(""), None);
        assert_eq!(Role::from_api("Invalid"), None);
    }

    #[test]
    fn test_record_serializes_as_single_line() {
        let record = MatchParticipantRecord {
            match_id: "NA1_1".to_string(),
            game_version: "15.24.734.1".to_string(),
            game_duration: 1800,
            game_creation: 1_700_000_000_000,
            puuid: "p1".to_string(),
            team_id: 100,
            champion_id: 103,
            champion_name: "Ahri".to_string(),
            position: Role::Middle,
            win: true,
            items: [3089, 3020, 0, 0, 0, 0],
            build_order: vec![3089],
            timeline_sampled: true,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"position\":\"MIDDLE\""));

        let parsed: MatchParticipantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.patch(), "15.24");
    }
}
