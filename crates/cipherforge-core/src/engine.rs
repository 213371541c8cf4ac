use crate::alphabet::Alphabet;
use crate::config::EngineConfig;
use crate::corpus::WordCorpus;
use crate::error::CfResult;
use crate::lexicon::Lexicon;
use crate::scheduler::BlockScheduler;
use crate::stats::{StatsAggregator, StatsHandle, StatsSnapshot, WorkerBatch};
use crate::translator::Translator;
use crate::validator::{ResultsWriter, Validator};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The assembled search pipeline: shared read-only corpus and lexicon, a
/// block scheduler with durable state, and a pool of worker threads each
/// running translate -> validate -> report.
pub struct SearchEngine {
    config: EngineConfig,
    corpus: Arc<WordCorpus>,
    lexicon: Arc<Lexicon>,
    scheduler: Arc<BlockScheduler>,
    translator: Arc<Translator>,
    results: Arc<ResultsWriter>,
    cancel: Arc<AtomicBool>,
}

impl SearchEngine {
    /// Loads the corpus and lexicon and resolves the translator backend.
    /// Any failure here is unrecoverable and propagates to the caller.
    pub fn new(config: EngineConfig) -> CfResult<Self> {
        info!("Loading source corpus from {:?}", config.source_words_path);
        let corpus = WordCorpus::load_from_file(&config.source_words_path, Alphabet::Eva)?;
        info!("Loaded {} source words", corpus.len());

        info!("Loading lexicon from {:?}", config.lexicon_path);
        let lexicon = Lexicon::load_from_file(&config.lexicon_path)?;

        let translator = Translator::new(config.backend)?;
        info!("Translator backend: {}", translator.backend_name());

        let scheduler = BlockScheduler::new(
            config.block_size,
            Some(config.state_file_path.clone()),
        );
        let results = ResultsWriter::new(config.results_file_path.clone());

        Ok(SearchEngine {
            corpus: Arc::new(corpus),
            lexicon: Arc::new(lexicon),
            scheduler: Arc::new(scheduler),
            translator: Arc::new(translator),
            results: Arc::new(results),
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Cooperative cancellation token. A signal handler should only flip
    /// this flag; workers observe it at every mapping boundary.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn scheduler(&self) -> &BlockScheduler {
        &self.scheduler
    }

    /// Runs the search until the permutation space is exhausted, the
    /// mapping limit is reached, or the cancel token flips. Always flushes
    /// the aggregator and persists scheduler state before returning.
    pub fn run(&self) -> CfResult<StatsSnapshot> {
        let worker_count = self.config.effective_thread_count();
        info!(
            "Starting search with {} workers, block size {}, threshold {:.1}",
            worker_count,
            self.scheduler.block_size(),
            self.config.score_threshold
        );
        info!(
            "Search space: {:.4}% already handed out",
            self.scheduler.progress_percentage()
        );

        let aggregator = StatsAggregator::start(Duration::from_millis(
            self.config.status_interval_ms.max(1),
        ));
        let workers_alive = Arc::new(AtomicUsize::new(worker_count));

        std::thread::scope(|scope| {
            for id in 0..worker_count {
                let stats = aggregator.handle();
                let alive = workers_alive.clone();
                scope.spawn(move || {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        self.worker_loop(id as i32, &stats);
                    }));
                    if outcome.is_err() {
                        error!("Worker {} panicked; other workers continue", id);
                    }
                    alive.fetch_sub(1, Ordering::AcqRel);
                });
            }

            // Main wait loop: watch for cancellation and the mapping limit
            // while the workers drain the schedule.
            while workers_alive.load(Ordering::Acquire) > 0 {
                if self.config.max_mappings > 0
                    && aggregator.snapshot().total_mappings >= self.config.max_mappings
                    && !self.cancel.load(Ordering::Relaxed)
                {
                    info!("Reached mapping limit; stopping workers");
                    self.cancel.store(true, Ordering::Release);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });

        self.scheduler.persist();
        let snapshot = aggregator.shutdown();
        self.log_final_results(&snapshot);
        Ok(snapshot)
    }

    /// One worker: pull a block, process its mappings in order, report the
    /// block complete, repeat. Cancellation mid-block returns without
    /// completing, which leaves the block PENDING for the next run.
    fn worker_loop(&self, worker_id: i32, stats: &StatsHandle) {
        let validator = Validator::new(
            self.lexicon.clone(),
            self.results.clone(),
            self.config.score_threshold,
            self.config.save_results,
        );

        stats.worker_started(worker_id);
        let mut batch = WorkerBatch::new(worker_id);
        let mut local_mappings = 0u64;
        let mut translated = Vec::with_capacity(self.corpus.len());

        'blocks: while !self.cancel.load(Ordering::Relaxed) {
            let Some(assignment) = self.scheduler.acquire_block(worker_id) else {
                break;
            };

            for mapping in &assignment.mappings {
                if self.cancel.load(Ordering::Relaxed) {
                    // The block stays PENDING and will be re-processed
                    // from the start on the next run.
                    break 'blocks;
                }

                self.translator
                    .translate_into(&self.corpus, &mapping.matrix, &mut translated);
                let result =
                    validator.validate_mapping(&translated, mapping.global_index, &mapping.matrix);

                local_mappings += 1;
                batch.record(&result);
                if result.is_high_score {
                    stats.high_score_found(worker_id, mapping.global_index, &result);
                }
                if batch.flush_due() {
                    batch.flush(stats);
                }
            }

            self.scheduler.complete_block(worker_id);
            batch.flush(stats);
        }

        batch.flush(stats);
        stats.worker_completed(worker_id, local_mappings);
    }

    fn log_final_results(&self, snapshot: &StatsSnapshot) {
        info!("{}", "=".repeat(60));
        info!("CIPHERFORGE - FINAL RESULTS");
        info!("{}", "=".repeat(60));
        info!("Total runtime: {:.1} minutes", snapshot.elapsed_minutes());
        info!("Mappings processed: {}", snapshot.total_mappings);
        info!("Words validated: {}", snapshot.total_words);
        info!("Average rate: {:.1} mappings/sec", snapshot.average_rate());
        info!("Highest score achieved: {:.2}", snapshot.highest_score);
        info!("High-scoring results: {}", snapshot.high_score_count);
        if snapshot.high_score_count > 0 {
            info!("Results saved to: {:?}", self.results.path());
        }
        info!("{}", "=".repeat(60));
    }
}
