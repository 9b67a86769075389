//! Minimum-rank gate for the crawl frontier

use crate::api_core::RankedEntry;

/// Competitive tiers in ascending order (ordinal = discriminant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Iron = 0,
    Bronze = 1,
    Silver = 2,
    Gold = 3,
    Platinum = 4,
    Emerald = 5,
    Diamond = 6,
    Master = 7,
    Grandmaster = 8,
    Challenger = 9,
}

impl Tier {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "IRON" => Some(Tier::Iron),
            "BRONZE" => Some(Tier::Bronze),
            "SILVER" => Some(Tier::Silver),
            "GOLD" => Some(Tier::Gold),
            "PLATINUM" => Some(Tier::Platinum),
            "EMERALD" => Some(Tier::Emerald),
            "DIAMOND" => Some(Tier::Diamond),
            "MASTER" => Some(Tier::Master),
            "GRANDMASTER" => Some(Tier::Grandmaster),
            "CHALLENGER" => Some(Tier::Challenger),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankGate {
    pub min_tier: Tier,
}

impl RankGate {
    pub fn new(min_tier: Tier) -> Self {
        Self { min_tier }
    }

    /// Whether a player at `tier`/`division` passes the gate.
    ///
    /// Only the tier is compared. Master and above report an empty division,
    /// so the division must never be required.
    pub fn qualifies(&self, tier: &str, _division: &str) -> bool {
        Tier::parse(tier).map_or(false, |t| t >= self.min_tier)
    }

    pub fn admits(&self, entry: Option<&RankedEntry>) -> bool {
        entry.map_or(false, |e| self.qualifies(&e.tier, &e.division))
    }
}
