//! Win/match accumulators and the four statistic tables
//!
//! Every table maps an increasingly specific key to an `Accumulator`.
//! Accumulators only ever add, so merging tables is commutative and
//! associative. Win rate is computed on read and never stored.

use crate::crawler_core::is_completed_item;
use crate::record::{MatchParticipantRecord, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub wins: u64,
    pub matches: u64,
}

impl Accumulator {
    pub fn record(&mut self, win: bool) {
        self.matches += 1;
        if win {
            self.wins += 1;
        }
    }

    pub fn merge(&mut self, other: &Accumulator) {
        self.wins += other.wins;
        self.matches += other.matches;
    }

    pub fn win_rate(&self) -> f64 {
        if self.matches == 0 {
            0.0
        } else {
            self.wins as f64 / self.matches as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChampionKey {
    pub patch: String,
    pub champion_id: u32,
    pub position: Role,
}

impl ChampionKey {
    pub fn from_record(record: &MatchParticipantRecord) -> Self {
        Self {
            patch: record.patch(),
            champion_id: record.champion_id,
            position: record.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    #[serde(flatten)]
    pub champion: ChampionKey,
    pub item_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemSlotKey {
    #[serde(flatten)]
    pub champion: ChampionKey,
    pub item_id: u32,
    /// Inventory slot 0..=5
    pub slot: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchupKey {
    #[serde(flatten)]
    pub champion: ChampionKey,
    pub enemy_champion_id: u32,
}

/// One exported table row: key columns followed by `wins`/`matches`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow<K> {
    #[serde(flatten)]
    pub key: K,
    pub wins: u64,
    pub matches: u64,
}

impl<K> TableRow<K> {
    pub fn win_rate(&self) -> f64 {
        self.accumulator().win_rate()
    }

    pub fn accumulator(&self) -> Accumulator {
        Accumulator {
            wins: self.wins,
            matches: self.matches,
        }
    }
}

fn to_rows<K: Clone>(table: &BTreeMap<K, Accumulator>) -> Vec<TableRow<K>> {
    table
        .iter()
        .map(|(key, acc)| TableRow {
            key: key.clone(),
            wins: acc.wins,
            matches: acc.matches,
        })
        .collect()
}

fn merge_table<K: Ord + Clone>(into: &mut BTreeMap<K, Accumulator>, from: &BTreeMap<K, Accumulator>) {
    for (key, acc) in from {
        into.entry(key.clone()).or_default().merge(acc);
    }
}

fn load_rows<K: Ord>(into: &mut BTreeMap<K, Accumulator>, rows: Vec<TableRow<K>>) {
    for row in rows {
        let acc = row.accumulator();
        into.entry(row.key).or_default().merge(&acc);
    }
}

/// Owned row vectors for every table, in key order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRows {
    pub champion_stats: Vec<TableRow<ChampionKey>>,
    pub champion_items: Vec<TableRow<ItemKey>>,
    pub champion_item_slots: Vec<TableRow<ItemSlotKey>>,
    pub champion_matchups: Vec<TableRow<MatchupKey>>,
}

impl TableRows {
    pub fn len(&self) -> usize {
        self.champion_stats.len()
            + self.champion_items.len()
            + self.champion_item_slots.len()
            + self.champion_matchups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTables {
    pub champion_stats: BTreeMap<ChampionKey, Accumulator>,
    pub champion_items: BTreeMap<ItemKey, Accumulator>,
    pub champion_item_slots: BTreeMap<ItemSlotKey, Accumulator>,
    pub champion_matchups: BTreeMap<MatchupKey, Accumulator>,
    /// champion id → display name, last seen wins
    pub champion_names: BTreeMap<u32, String>,
}

impl AggregateTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one participant record. `enemy_champion_id` is the opposing
    /// laner at the same position, when the match had one.
    pub fn record(&mut self, record: &MatchParticipantRecord, enemy_champion_id: Option<u32>) {
        let champion = ChampionKey::from_record(record);

        self.champion_stats.entry(champion.clone()).or_default().record(record.win);
        self.champion_names
            .insert(record.champion_id, record.champion_name.clone());

        let mut counted: Vec<u32> = Vec::with_capacity(6);
        for (slot, &item_id) in record.items.iter().enumerate() {
            if !is_completed_item(item_id) {
                continue;
            }

            // Two copies of one item count once per match in the item table
            if !counted.contains(&item_id) {
                counted.push(item_id);
                self.champion_items
                    .entry(ItemKey { champion: champion.clone(), item_id })
                    .or_default()
                    .record(record.win);
            }

            self.champion_item_slots
                .entry(ItemSlotKey {
                    champion: champion.clone(),
                    item_id,
                    slot: slot as u8,
                })
                .or_default()
                .record(record.win);
        }

        if let Some(enemy_champion_id) = enemy_champion_id {
            self.champion_matchups
                .entry(MatchupKey { champion, enemy_champion_id })
                .or_default()
                .record(record.win);
        }
    }

    pub fn merge(&mut self, other: &AggregateTables) {
        merge_table(&mut self.champion_stats, &other.champion_stats);
        merge_table(&mut self.champion_items, &other.champion_items);
        merge_table(&mut self.champion_item_slots, &other.champion_item_slots);
        merge_table(&mut self.champion_matchups, &other.champion_matchups);
        for (id, name) in &other.champion_names {
            self.champion_names.insert(*id, name.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.champion_stats.is_empty()
    }

    /// Participant-games folded into `champion_stats`
    pub fn total_games(&self) -> u64 {
        self.champion_stats.values().map(|acc| acc.matches).sum()
    }

    pub fn rows(&self) -> TableRows {
        TableRows {
            champion_stats: to_rows(&self.champion_stats),
            champion_items: to_rows(&self.champion_items),
            champion_item_slots: to_rows(&self.champion_item_slots),
            champion_matchups: to_rows(&self.champion_matchups),
        }
    }

    pub fn from_rows(rows: TableRows, champion_names: BTreeMap<u32, String>) -> Self {
        let mut tables = Self {
            champion_names,
            ..Self::default()
        };
        load_rows(&mut tables.champion_stats, rows.champion_stats);
        load_rows(&mut tables.champion_items, rows.champion_items);
        load_rows(&mut tables.champion_item_slots, rows.champion_item_slots);
        load_rows(&mut tables.champion_matchups, rows.champion_matchups);
        tables
    }
}
