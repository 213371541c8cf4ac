use cipherforge_core::consts::DEFAULT_BLOCK_SIZE;
use cipherforge_core::error::CfResult;
use cipherforge_core::scheduler::BlockScheduler;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[arg(long, default_value = "cipherforge_state.json")]
    pub state_file_path: PathBuf,
}

pub fn run(args: ResetArgs) -> CfResult<()> {
    if !args.state_file_path.exists() {
        info!("No checkpoint at {:?}; nothing to reset", args.state_file_path);
        return Ok(());
    }

    let scheduler = BlockScheduler::new(DEFAULT_BLOCK_SIZE, Some(args.state_file_path.clone()));
    scheduler.reset();
    info!("Checkpoint {:?} removed", args.state_file_path);
    Ok(())
}
