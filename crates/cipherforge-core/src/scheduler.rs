use crate::consts::{TOTAL_PERMUTATIONS, UNASSIGNED_WORKER};
use crate::mapping::{GeneratedMapping, SubstitutionMatrix};
use crate::permute::permutation_at;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Lifecycle of a tracked block. PENDING blocks may be reassigned between
/// workers (e.g. after a restart); COMPLETED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "COMPLETED")]
    Completed,
}

/// Serializes optional epoch-second timestamps as strings, and reads back
/// either strings or bare numbers from older checkpoint files.
mod epoch_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i64>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(secs) => ser.serialize_str(&secs.to_string()),
            None => ser.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(de)? {
            Some(Raw::Num(n)) => Some(n),
            Some(Raw::Text(s)) => s.trim().parse().ok(),
            None => None,
        })
    }
}

/// One tracked unit of work: the permutation range
/// [block_index * block_size, (block_index + 1) * block_size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "blockIndex")]
    pub block_index: u64,
    pub state: BlockState,
    #[serde(rename = "assignedThreadId")]
    pub assigned_worker: i32,
    #[serde(rename = "assignedTime", with = "epoch_string", default)]
    pub assigned_at: Option<i64>,
    #[serde(rename = "completedTime", with = "epoch_string", default)]
    pub completed_at: Option<i64>,
}

/// The checkpointed counters. Preserved verbatim across restarts so no
/// permutation index is ever repeated or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorState {
    #[serde(rename = "nextBlockToGenerate")]
    pub next_block_to_generate: u64,
    #[serde(rename = "oldestTrackedBlock")]
    pub oldest_tracked_block: u64,
    #[serde(rename = "totalBlocksGenerated")]
    pub total_blocks_generated: u64,
    #[serde(rename = "totalBlocksCompleted")]
    pub total_blocks_completed: u64,
    #[serde(rename = "isComplete")]
    pub is_complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointConfig {
    #[serde(rename = "blockSize")]
    block_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    generator_state: GeneratorState,
    block_window: Vec<Block>,
    config: CheckpointConfig,
}

/// A block handed to a worker: the block index plus every mapping in its
/// range, in increasing permutation-index order. The final block of the
/// search space is shorter when 27! is not a multiple of the block size.
#[derive(Debug)]
pub struct BlockAssignment {
    pub block_index: u64,
    pub mappings: Vec<GeneratedMapping>,
}

struct SchedulerInner {
    state: GeneratorState,
    window: VecDeque<Block>,
}

/// Hands out contiguous permutation blocks to workers and tracks them in a
/// sliding window with durable JSON checkpoints.
///
/// Every operation runs under one lock; the checkpoint is rewritten after
/// each allocation, completion, and head prune (write-temp-then-rename, so
/// a crash mid-write never corrupts the previous state). On load, PENDING
/// blocks lose their worker assignment and become available again.
pub struct BlockScheduler {
    block_size: u64,
    state_path: Option<PathBuf>,
    inner: Mutex<SchedulerInner>,
}

impl BlockScheduler {
    pub fn new(block_size: u64, state_path: Option<PathBuf>) -> Self {
        assert!(block_size > 0, "block size must be positive");

        let fresh = || SchedulerInner {
            state: GeneratorState::default(),
            window: VecDeque::new(),
        };

        let mut block_size = block_size;
        let inner = match state_path.as_deref() {
            Some(path) if path.exists() => match Self::load_checkpoint(path) {
                Ok(checkpoint) => {
                    info!(
                        "Resuming scheduler state: next block {}, window {}, {} completed",
                        checkpoint.generator_state.next_block_to_generate,
                        checkpoint.block_window.len(),
                        checkpoint.generator_state.total_blocks_completed
                    );

                    // Indices are only meaningful relative to the block size
                    // the window was generated with, so the checkpoint wins.
                    if checkpoint.config.block_size != block_size {
                        warn!(
                            "Configured block size {} differs from checkpoint ({}); keeping the checkpoint value",
                            block_size, checkpoint.config.block_size
                        );
                        block_size = checkpoint.config.block_size;
                    }

                    let mut window: VecDeque<Block> = checkpoint.block_window.into();
                    for block in window.iter_mut() {
                        if block.state == BlockState::Pending {
                            block.assigned_worker = UNASSIGNED_WORKER;
                            block.assigned_at = None;
                        }
                    }

                    SchedulerInner {
                        state: checkpoint.generator_state,
                        window,
                    }
                }
                Err(e) => {
                    warn!("Could not load scheduler state ({}); starting fresh", e);
                    fresh()
                }
            },
            _ => fresh(),
        };

        BlockScheduler {
            block_size,
            state_path,
            inner: Mutex::new(inner),
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Hands the calling worker a block to process. Reassignable PENDING
    /// blocks in the window take priority over generating new ones; returns
    /// None once the whole permutation space has been handed out.
    pub fn acquire_block(&self, worker_id: i32) -> Option<BlockAssignment> {
        let mut inner = self.lock();

        // A worker asking for a new block while still holding one has
        // finished its previous range without reporting it.
        if let Some(position) = Self::position_of_worker(&inner, worker_id) {
            warn!(
                "Worker {} acquired a new block while still holding block {}; completing it first",
                worker_id, inner.window[position].block_index
            );
            self.complete_at_position(&mut inner, position);
        }

        if inner.state.is_complete {
            return None;
        }

        // Prefer re-assignment of an orphaned block from the window.
        if let Some(block) = inner
            .window
            .iter_mut()
            .find(|b| b.state == BlockState::Pending && b.assigned_worker == UNASSIGNED_WORKER)
        {
            block.assigned_worker = worker_id;
            block.assigned_at = Some(now_epoch_secs());
            let block_index = block.block_index;

            debug!("Reassigned block {} to worker {}", block_index, worker_id);
            self.save_checkpoint(&inner);
            return Some(BlockAssignment {
                block_index,
                mappings: self.generate_block_mappings(block_index),
            });
        }

        // Nothing to reassign: generate the next block, unless the space
        // is exhausted.
        let next = inner.state.next_block_to_generate;
        if next.saturating_mul(self.block_size) >= TOTAL_PERMUTATIONS {
            inner.state.is_complete = true;
            info!("All {} permutations have been handed out", TOTAL_PERMUTATIONS);
            self.save_checkpoint(&inner);
            return None;
        }

        inner.window.push_back(Block {
            block_index: next,
            state: BlockState::Pending,
            assigned_worker: worker_id,
            assigned_at: Some(now_epoch_secs()),
            completed_at: None,
        });
        inner.state.next_block_to_generate += 1;
        inner.state.total_blocks_generated += 1;

        debug!("Generated block {} for worker {}", next, worker_id);
        self.save_checkpoint(&inner);
        Some(BlockAssignment {
            block_index: next,
            mappings: self.generate_block_mappings(next),
        })
    }

    /// Marks the block held by `worker_id` as COMPLETED and prunes the run
    /// of completed blocks at the head of the window, advancing the oldest
    /// tracked index past each one.
    pub fn complete_block(&self, worker_id: i32) {
        let mut inner = self.lock();
        match Self::position_of_worker(&inner, worker_id) {
            Some(position) => self.complete_at_position(&mut inner, position),
            None => warn!(
                "Worker {} reported completion but holds no pending block",
                worker_id
            ),
        }
    }

    /// Wipes the window and counters and deletes the checkpoint file.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = GeneratorState::default();
        inner.window.clear();

        if let Some(path) = &self.state_path {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Could not delete state file {:?}: {}", path, e);
                }
            }
        }
        info!("Scheduler state reset");
    }

    pub fn is_complete(&self) -> bool {
        self.lock().state.is_complete
    }

    pub fn state(&self) -> GeneratorState {
        self.lock().state.clone()
    }

    pub fn window_snapshot(&self) -> Vec<Block> {
        self.lock().window.iter().cloned().collect()
    }

    /// Fraction of the permutation space already handed out, in percent.
    pub fn progress_percentage(&self) -> f64 {
        let handed_out = self
            .lock()
            .state
            .next_block_to_generate
            .saturating_mul(self.block_size)
            .min(TOTAL_PERMUTATIONS);
        handed_out as f64 / TOTAL_PERMUTATIONS as f64 * 100.0
    }

    pub fn remaining_permutations(&self) -> u64 {
        let handed_out = self
            .lock()
            .state
            .next_block_to_generate
            .saturating_mul(self.block_size)
            .min(TOTAL_PERMUTATIONS);
        TOTAL_PERMUTATIONS - handed_out
    }

    /// Forces a checkpoint write of the current state (used at shutdown).
    pub fn persist(&self) {
        let inner = self.lock();
        self.save_checkpoint(&inner);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn position_of_worker(inner: &SchedulerInner, worker_id: i32) -> Option<usize> {
        inner
            .window
            .iter()
            .position(|b| b.state == BlockState::Pending && b.assigned_worker == worker_id)
    }

    fn complete_at_position(&self, inner: &mut SchedulerInner, position: usize) {
        {
            let block = &mut inner.window[position];
            block.state = BlockState::Completed;
            block.completed_at = Some(now_epoch_secs());
            block.assigned_worker = UNASSIGNED_WORKER;
        }
        inner.state.total_blocks_completed += 1;

        while let Some(head) = inner.window.front() {
            if head.state == BlockState::Completed
                && head.block_index == inner.state.oldest_tracked_block
            {
                inner.window.pop_front();
                inner.state.oldest_tracked_block += 1;
            } else {
                break;
            }
        }

        self.save_checkpoint(inner);
    }

    /// Materializes every mapping in a block's range, truncated at the
    /// space boundary. A corrupt out-of-range index yields an empty block
    /// rather than a panic.
    fn generate_block_mappings(&self, block_index: u64) -> Vec<GeneratedMapping> {
        let start = block_index.saturating_mul(self.block_size);
        let end = start
            .saturating_add(self.block_size)
            .min(TOTAL_PERMUTATIONS);

        (start..end)
            .map(|global_index| GeneratedMapping {
                global_index,
                matrix: SubstitutionMatrix::from_permutation(&permutation_at(global_index)),
            })
            .collect()
    }

    fn save_checkpoint(&self, inner: &SchedulerInner) {
        let Some(path) = &self.state_path else {
            return;
        };

        let checkpoint = Checkpoint {
            generator_state: inner.state.clone(),
            block_window: inner.window.iter().cloned().collect(),
            config: CheckpointConfig {
                block_size: self.block_size,
            },
        };

        // Never fatal: a failed checkpoint write costs at most re-processing
        // one window of blocks after the next restart.
        if let Err(e) = Self::write_atomically(path, &checkpoint) {
            warn!("Could not write scheduler state to {:?}: {}", path, e);
        }
    }

    fn write_atomically(path: &Path, checkpoint: &Checkpoint) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)
    }

    fn load_checkpoint(path: &Path) -> Result<Checkpoint, String> {
        if !path.exists() {
            return Err(format!("{:?} does not exist", path));
        }
        let raw = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
