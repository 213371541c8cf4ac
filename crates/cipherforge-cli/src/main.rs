use clap::{Parser, Subcommand};
use std::process;
use tracing::error;

mod cmd;

#[derive(Parser, Debug)]
#[command(author, version, about = "Exhaustive EVA-to-Hebrew substitution mapping search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the search (resumes from the checkpoint file if present)
    Search(cmd::search::SearchArgs),
    /// Show the checkpointed scheduler state
    Status(cmd::status::StatusArgs),
    /// Discard the checkpoint and start the search space from index 0
    Reset(cmd::reset::ResetArgs),
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Search(args) => cmd::search::run(args),
        Commands::Status(args) => cmd::status::run(args),
        Commands::Reset(args) => cmd::reset::run(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
