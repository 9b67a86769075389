//! Crawl frontier: FIFO player queue plus visited filters
//!
//! Both filters live for the whole run. A player is marked visited when
//! first enqueued and is never queued again; a match is marked once its
//! fetch has reached a final outcome (recorded or skipped). The only way
//! back into the queue is `requeue_front`, for a player whose crawl was
//! interrupted by key exhaustion or shutdown.

use super::bloom::BloomFilter;
use std::collections::VecDeque;

pub struct CrawlFrontier {
    queue: VecDeque<String>,
    visited_matches: BloomFilter,
    visited_players: BloomFilter,
}

impl CrawlFrontier {
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        Self {
            queue: VecDeque::new(),
            visited_matches: BloomFilter::with_rate(expected_items, false_positive_rate),
            visited_players: BloomFilter::with_rate(expected_items, false_positive_rate),
        }
    }

    /// Enqueue a player unless already visited; returns whether it was queued
    pub fn enqueue_player(&mut self, puuid: &str) -> bool {
        if self.visited_players.insert(puuid) {
            self.queue.push_back(puuid.to_string());
            true
        } else {
            false
        }
    }

    pub fn next_player(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Put an interrupted player back at the head of the queue.
    ///
    /// Bypasses the visited filter: the player is already marked, its crawl
    /// just did not finish.
    pub fn requeue_front(&mut self, puuid: String) {
        self.queue.push_front(puuid);
    }

    pub fn has_seen_match(&self, match_id: &str) -> bool {
        self.visited_matches.contains(match_id)
    }

    /// Mark a match visited; returns `false` if it was already (apparently) seen
    pub fn mark_match(&mut self, match_id: &str) -> bool {
        self.visited_matches.insert(match_id)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn matches_seen(&self) -> usize {
        self.visited_matches.len()
    }
}
