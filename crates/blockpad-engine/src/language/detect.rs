//! Debounce and staleness bookkeeping for auto-detection.
//!
//! The engine never runs detectors itself; it decides *when* a block is
//! due and whether a finished result is still about the content it was
//! computed from. Every change to a block bumps that block's generation
//! and resets its deadline. A result carries the generation of the
//! snapshot it saw and is dropped if the block has moved on since.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::blocks::BlockId;
use crate::language::Language;

pub const DEFAULT_DETECTION_DELAY: Duration = Duration::from_secs(2);

/// A due block, snapshotted at the moment it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRequest {
    pub block: BlockId,
    pub generation: u64,
    pub content: String,
}

/// What a detector run concluded for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionResult {
    pub block: BlockId,
    pub generation: u64,
    pub language: Language,
}

pub struct DetectionEngine {
    delay: Duration,
    generations: HashMap<BlockId, u64>,
    deadlines: HashMap<BlockId, Instant>,
}

impl DetectionEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generations: HashMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Record a change to the block: new generation, deadline reset (not
    /// extended) to one full delay from `now`.
    pub(crate) fn bump(&mut self, block: BlockId, now: Instant) {
        *self.generations.entry(block).or_insert(0) += 1;
        self.deadlines.insert(block, now + self.delay);
    }

    /// Drop any pending deadline without touching the generation. Used
    /// when a block stops being detection-eligible.
    pub(crate) fn cancel(&mut self, block: BlockId) {
        self.deadlines.remove(&block);
    }

    /// Forget a block entirely, e.g. when it is deleted.
    pub(crate) fn forget(&mut self, block: BlockId) {
        self.generations.remove(&block);
        self.deadlines.remove(&block);
    }

    /// Keep state only for blocks the predicate accepts.
    pub(crate) fn retain<F: Fn(BlockId) -> bool>(&mut self, keep: F) {
        self.generations.retain(|block, _| keep(*block));
        self.deadlines.retain(|block, _| keep(*block));
    }

    /// Drop all per-block state, keeping the configured delay.
    pub(crate) fn clear(&mut self) {
        self.generations.clear();
        self.deadlines.clear();
    }

    pub fn generation(&self, block: BlockId) -> u64 {
        self.generations.get(&block).copied().unwrap_or(0)
    }

    /// Whether a result stamped with `generation` is still about the
    /// block's current content.
    pub fn is_current(&self, block: BlockId, generation: u64) -> bool {
        self.generation(block) == generation
    }

    /// Earliest pending deadline, for hosts that want to sleep precisely.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every block whose debounce window has elapsed.
    /// The caller snapshots content and builds [`DetectionRequest`]s.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<BlockId> {
        let mut due: Vec<BlockId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(block, _)| *block)
            .collect();
        due.sort();
        for block in &due {
            self.deadlines.remove(block);
        }
        due
    }
}
