use cipherforge_core::consts::{TOTAL_PERMUTATIONS, UNASSIGNED_WORKER};
use cipherforge_core::permute::permutation_at;
use cipherforge_core::scheduler::{Block, BlockScheduler, BlockState};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::tempdir;

/// The window invariants that must hold after any operation sequence.
fn assert_invariants(scheduler: &BlockScheduler) {
    let state = scheduler.state();
    let window: Vec<Block> = scheduler.window_snapshot();

    for pair in window.windows(2) {
        assert!(
            pair[0].block_index < pair[1].block_index,
            "window must be strictly ordered"
        );
    }
    for block in &window {
        assert!(block.block_index >= state.oldest_tracked_block);
        assert!(block.block_index < state.next_block_to_generate);
    }
    assert!(state.total_blocks_completed <= state.total_blocks_generated);

    // Completed blocks at the head must have been pruned.
    if let Some(head) = window.first() {
        assert!(
            !(head.state == BlockState::Completed
                && head.block_index == state.oldest_tracked_block),
            "completed head block was not pruned"
        );
    }

    // No worker id may hold more than one pending block.
    let mut holders = HashSet::new();
    for block in &window {
        if block.state == BlockState::Pending && block.assigned_worker != UNASSIGNED_WORKER {
            assert!(
                holders.insert(block.assigned_worker),
                "worker {} holds two pending blocks",
                block.assigned_worker
            );
        }
    }
}

#[test]
fn block_handoff_tracks_three_workers() {
    let scheduler = BlockScheduler::new(3, None);

    for worker in 0..3 {
        let assignment = scheduler.acquire_block(worker).expect("block expected");
        assert_eq!(assignment.block_index, worker as u64);
        assert_eq!(assignment.mappings.len(), 3);
    }

    let state = scheduler.state();
    assert_eq!(state.next_block_to_generate, 3);
    assert_eq!(state.total_blocks_generated, 3);
    assert_eq!(scheduler.window_snapshot().len(), 3);
    assert_invariants(&scheduler);

    scheduler.complete_block(0);

    let state = scheduler.state();
    let window = scheduler.window_snapshot();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].block_index, 1);
    assert_eq!(window[1].block_index, 2);
    assert_eq!(state.oldest_tracked_block, 1);
    assert_eq!(state.total_blocks_completed, 1);
    assert_invariants(&scheduler);
}

#[test]
fn out_of_order_completion_defers_head_prune() {
    let scheduler = BlockScheduler::new(2, None);
    scheduler.acquire_block(0).unwrap();
    scheduler.acquire_block(1).unwrap();
    scheduler.acquire_block(2).unwrap();

    // Completing block 1 first must not advance the window head.
    scheduler.complete_block(1);
    let state = scheduler.state();
    assert_eq!(state.oldest_tracked_block, 0);
    assert_eq!(scheduler.window_snapshot().len(), 3);
    assert_invariants(&scheduler);

    // Completing block 0 prunes the completed run at the head.
    scheduler.complete_block(0);
    let state = scheduler.state();
    assert_eq!(state.oldest_tracked_block, 2);
    assert_eq!(scheduler.window_snapshot().len(), 1);
    assert_invariants(&scheduler);
}

#[test]
fn block_mappings_follow_the_global_enumeration() {
    let scheduler = BlockScheduler::new(4, None);
    let a = scheduler.acquire_block(0).unwrap();
    let b = scheduler.acquire_block(1).unwrap();

    for (offset, mapping) in a.mappings.iter().enumerate() {
        assert_eq!(mapping.global_index, offset as u64);
        assert_eq!(
            mapping.matrix.to_permutation().unwrap(),
            permutation_at(offset as u64)
        );
    }
    assert_eq!(b.mappings[0].global_index, 4);
}

#[test]
fn crash_recovery_reissues_the_pending_block() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    {
        let scheduler = BlockScheduler::new(3, Some(state_path.clone()));
        let assignment = scheduler.acquire_block(0).unwrap();
        assert_eq!(assignment.block_index, 0);
        // Simulated crash: two of three mappings processed, never completed.
    }

    let scheduler = BlockScheduler::new(3, Some(state_path));
    let window = scheduler.window_snapshot();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].state, BlockState::Pending);
    assert_eq!(window[0].assigned_worker, UNASSIGNED_WORKER);

    // A fresh worker picks the orphaned block back up, from the start.
    let assignment = scheduler.acquire_block(7).unwrap();
    assert_eq!(assignment.block_index, 0);
    assert_eq!(assignment.mappings.len(), 3);
    assert_eq!(assignment.mappings[0].global_index, 0);
    assert_invariants(&scheduler);
}

#[test]
fn enumeration_is_deterministic_across_restart() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let mut seen = Vec::new();

    {
        let scheduler = BlockScheduler::new(5, Some(state_path.clone()));
        for _ in 0..4 {
            let assignment = scheduler.acquire_block(0).unwrap();
            for m in &assignment.mappings {
                seen.push((m.global_index, m.matrix.to_permutation().unwrap()));
            }
            scheduler.complete_block(0);
        }
    }

    let scheduler = BlockScheduler::new(5, Some(state_path));
    for _ in 0..4 {
        let assignment = scheduler.acquire_block(0).unwrap();
        for m in &assignment.mappings {
            seen.push((m.global_index, m.matrix.to_permutation().unwrap()));
        }
        scheduler.complete_block(0);
    }

    // The union of both runs is exactly the first 40 permutations, in order.
    assert_eq!(seen.len(), 40);
    for (offset, (index, permutation)) in seen.iter().enumerate() {
        assert_eq!(*index, offset as u64);
        assert_eq!(*permutation, permutation_at(offset as u64));
    }
    assert_invariants(&scheduler);
}

#[test]
fn serialized_state_round_trips() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let before = {
        let scheduler = BlockScheduler::new(10, Some(state_path.clone()));
        scheduler.acquire_block(0).unwrap();
        scheduler.acquire_block(1).unwrap();
        scheduler.acquire_block(2).unwrap();
        scheduler.complete_block(1);
        scheduler.state()
    };

    let scheduler = BlockScheduler::new(10, Some(state_path));
    assert_eq!(scheduler.state(), before);
    for block in scheduler.window_snapshot() {
        if block.state == BlockState::Pending {
            assert_eq!(block.assigned_worker, UNASSIGNED_WORKER);
            assert!(block.assigned_at.is_none());
        }
    }
    assert_invariants(&scheduler);
}

#[test]
fn checkpoint_reader_tolerates_unknown_fields_and_numeric_times() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        r#"{
            "generator_state": {
                "nextBlockToGenerate": 2,
                "oldestTrackedBlock": 1,
                "totalBlocksGenerated": 2,
                "totalBlocksCompleted": 1,
                "isComplete": false,
                "futureField": "ignored"
            },
            "block_window": [
                { "blockIndex": 1, "state": "PENDING",
                  "assignedThreadId": 3, "assignedTime": 1700000000,
                  "completedTime": "", "extra": 42 }
            ],
            "config": { "blockSize": 5 }
        }"#,
    )
    .unwrap();

    let scheduler = BlockScheduler::new(5, Some(state_path));
    let state = scheduler.state();
    assert_eq!(state.next_block_to_generate, 2);
    assert_eq!(state.oldest_tracked_block, 1);

    let window = scheduler.window_snapshot();
    assert_eq!(window.len(), 1);
    // Pending blocks lose their worker on load.
    assert_eq!(window[0].assigned_worker, UNASSIGNED_WORKER);
    assert_invariants(&scheduler);
}

#[test]
fn corrupt_checkpoint_falls_back_to_a_fresh_state() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(&state_path, "not json {{{").unwrap();

    let scheduler = BlockScheduler::new(5, Some(state_path));
    assert_eq!(scheduler.state().next_block_to_generate, 0);
    let assignment = scheduler.acquire_block(0).unwrap();
    assert_eq!(assignment.block_index, 0);
}

#[test]
fn checkpoint_block_size_wins_over_configured_value() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    {
        let scheduler = BlockScheduler::new(6, Some(state_path.clone()));
        scheduler.acquire_block(0).unwrap();
    }

    // Restarting with a different block size must not shift the indices.
    let scheduler = BlockScheduler::new(1000, Some(state_path));
    assert_eq!(scheduler.block_size(), 6);
    let assignment = scheduler.acquire_block(0).unwrap();
    assert_eq!(assignment.block_index, 0);
    assert_eq!(assignment.mappings.len(), 6);
}

#[test]
fn final_block_is_truncated_at_the_space_boundary() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    // A block size that does not divide the search space, with the
    // counters positioned at the last block.
    let block_size: u64 = 7919;
    let last_block = TOTAL_PERMUTATIONS / block_size;
    let tail = (TOTAL_PERMUTATIONS % block_size) as usize;
    assert!(tail > 0, "pick a block size that leaves a short tail");

    std::fs::write(
        &state_path,
        format!(
            r#"{{
                "generator_state": {{
                    "nextBlockToGenerate": {last_block},
                    "oldestTrackedBlock": {last_block},
                    "totalBlocksGenerated": {last_block},
                    "totalBlocksCompleted": {last_block},
                    "isComplete": false
                }},
                "block_window": [],
                "config": {{ "blockSize": {block_size} }}
            }}"#
        ),
    )
    .unwrap();

    let scheduler = BlockScheduler::new(block_size, Some(state_path));
    let assignment = scheduler.acquire_block(0).expect("tail block expected");
    assert_eq!(assignment.block_index, last_block);
    assert_eq!(assignment.mappings.len(), tail);
    assert_eq!(
        assignment.mappings.last().unwrap().global_index,
        TOTAL_PERMUTATIONS - 1
    );

    scheduler.complete_block(0);
    assert!(scheduler.acquire_block(0).is_none());
    assert!(scheduler.is_complete());
}

#[test]
fn reset_discards_state_and_checkpoint() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let scheduler = BlockScheduler::new(4, Some(state_path.clone()));
    scheduler.acquire_block(0).unwrap();
    assert!(state_path.exists());

    scheduler.reset();
    assert!(!state_path.exists());
    assert_eq!(scheduler.state().next_block_to_generate, 0);
    assert!(scheduler.window_snapshot().is_empty());
}

#[test]
fn double_acquire_completes_the_previous_block_first() {
    let scheduler = BlockScheduler::new(2, None);
    scheduler.acquire_block(0).unwrap();
    let second = scheduler.acquire_block(0).unwrap();

    // The first block was force-completed, so the worker moved on.
    assert_eq!(second.block_index, 1);
    assert_eq!(scheduler.state().total_blocks_completed, 1);
    assert_invariants(&scheduler);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Any interleaving of acquires and completions from a small worker
    // pool leaves the window invariants intact.
    #[test]
    fn invariants_hold_under_arbitrary_operation_sequences(
        ops in proptest::collection::vec((0u8..2, 0i32..4), 1..60)
    ) {
        let scheduler = BlockScheduler::new(3, None);
        for (op, worker) in ops {
            match op {
                0 => {
                    let _ = scheduler.acquire_block(worker);
                }
                _ => scheduler.complete_block(worker),
            }
            assert_invariants(&scheduler);
        }
    }
}
