use crate::consts::{DEFAULT_BLOCK_SIZE, DEFAULT_SCORE_THRESHOLD, DEFAULT_STATUS_INTERVAL_MS};
use crate::translator::TranslatorBackend;
use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[arg(
        long,
        default_value = "resources/voynich_words.txt",
        help = "Source corpus: one EVA word per line"
    )]
    pub source_words_path: PathBuf,

    #[arg(
        long,
        default_value = "resources/hebrew_lexicon.txt",
        help = "Target lexicon: one Hebrew word per line"
    )]
    pub lexicon_path: PathBuf,

    #[arg(
        long,
        default_value = "cipherforge_results.txt",
        help = "Append-only file for high-scoring mappings"
    )]
    pub results_file_path: PathBuf,

    #[arg(
        long,
        default_value_t = DEFAULT_SCORE_THRESHOLD,
        help = "Minimum score for a mapping to be persisted"
    )]
    pub score_threshold: f64,

    #[arg(long, default_value_t = 0, help = "Worker threads (0 = auto-detect)")]
    pub num_threads: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_BLOCK_SIZE,
        help = "Permutations per scheduler block"
    )]
    pub block_size: u64,

    #[arg(
        long,
        default_value = "cipherforge_state.json",
        help = "Scheduler checkpoint file"
    )]
    pub state_file_path: PathBuf,

    #[arg(
        long,
        default_value_t = 0,
        help = "Stop after this many mappings (0 = unlimited)"
    )]
    pub max_mappings: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_STATUS_INTERVAL_MS,
        help = "Milliseconds between status lines"
    )]
    pub status_interval_ms: u64,

    #[arg(long, value_enum, default_value_t = TranslatorBackend::Auto)]
    pub backend: TranslatorBackend,

    #[arg(
        long = "no-save-results",
        action = ArgAction::SetFalse,
        default_value_t = true,
        help = "Do not append high scores to the results file"
    )]
    pub save_results: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_words_path: PathBuf::from("resources/voynich_words.txt"),
            lexicon_path: PathBuf::from("resources/hebrew_lexicon.txt"),
            results_file_path: PathBuf::from("cipherforge_results.txt"),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            num_threads: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            state_file_path: PathBuf::from("cipherforge_state.json"),
            max_mappings: 0,
            status_interval_ms: DEFAULT_STATUS_INTERVAL_MS,
            backend: TranslatorBackend::Auto,
            save_results: true,
        }
    }
}

impl EngineConfig {
    pub fn effective_thread_count(&self) -> usize {
        if self.num_threads > 0 {
            self.num_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .max(1)
        }
    }
}
