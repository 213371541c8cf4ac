use cipherforge_core::consts::DEFAULT_BLOCK_SIZE;
use cipherforge_core::error::CfResult;
use cipherforge_core::scheduler::{BlockScheduler, BlockState};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "cipherforge_state.json")]
    pub state_file_path: PathBuf,
}

pub fn run(args: StatusArgs) -> CfResult<()> {
    if !args.state_file_path.exists() {
        info!(
            "No checkpoint at {:?}; the search has not run yet",
            args.state_file_path
        );
        return Ok(());
    }

    // Constructing the scheduler performs the same tolerant load the
    // search itself would; the checkpoint's own block size wins.
    let scheduler = BlockScheduler::new(DEFAULT_BLOCK_SIZE, Some(args.state_file_path.clone()));
    let state = scheduler.state();
    let window = scheduler.window_snapshot();

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec!["Field", "Value"]);
    summary.add_row(vec![
        Cell::new("Next block to generate"),
        Cell::new(state.next_block_to_generate),
    ]);
    summary.add_row(vec![
        Cell::new("Oldest tracked block"),
        Cell::new(state.oldest_tracked_block),
    ]);
    summary.add_row(vec![
        Cell::new("Blocks generated"),
        Cell::new(state.total_blocks_generated),
    ]);
    summary.add_row(vec![
        Cell::new("Blocks completed"),
        Cell::new(state.total_blocks_completed),
    ]);
    summary.add_row(vec![Cell::new("Block size"), Cell::new(scheduler.block_size())]);
    summary.add_row(vec![
        Cell::new("Space handed out"),
        Cell::new(format!("{:.6}%", scheduler.progress_percentage())),
    ]);
    summary.add_row(vec![
        Cell::new("Search complete"),
        Cell::new(state.is_complete),
    ]);
    println!("{summary}");

    if !window.is_empty() {
        let mut blocks = Table::new();
        blocks.load_preset(UTF8_FULL);
        blocks.set_header(vec!["Block", "State", "Worker"]);
        for block in &window {
            blocks.add_row(vec![
                Cell::new(block.block_index),
                Cell::new(match block.state {
                    BlockState::Pending => "PENDING",
                    BlockState::Completed => "COMPLETED",
                }),
                Cell::new(block.assigned_worker),
            ]);
        }
        println!("{blocks}");
    }

    Ok(())
}
