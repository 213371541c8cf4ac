use cipherforge_core::{CfResult, EngineConfig, SearchEngine};
use clap::Args;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub config: EngineConfig,
}

pub fn run(args: SearchArgs) -> CfResult<()> {
    info!("Initializing cipherforge search...");
    let engine = SearchEngine::new(args.config)?;

    // The handler only flips the token; workers notice it at the next
    // mapping boundary and the engine shuts down cleanly.
    let cancel = engine.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupt received; finishing in-flight work...");
        cancel.store(true, Ordering::Release);
    }) {
        warn!("Could not install signal handler: {}", e);
    }

    let snapshot = engine.run()?;

    info!(
        "Search stopped after {} mappings ({:.4}% of the space handed out)",
        snapshot.total_mappings,
        engine.scheduler().progress_percentage()
    );
    Ok(())
}
