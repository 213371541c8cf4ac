use crate::validator::ValidationResult;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Capacity of the stats queue. Workers flush batched counters about once
/// a second, so the queue stays far below this under normal load.
const QUEUE_CAPACITY: usize = 4096;

#[derive(Debug)]
pub enum StatsMessage {
    MappingProcessed {
        worker_id: i32,
        mapping_id: u64,
        words_validated: u64,
        score: f64,
    },
    BatchStats {
        worker_id: i32,
        mappings: u64,
        words: u64,
        highest_score: f64,
        had_high_score: bool,
    },
    HighScoreFound {
        worker_id: i32,
        mapping_id: u64,
        score: f64,
        matched_words: usize,
        total_words: usize,
        match_percentage: f64,
    },
    WorkerStarted {
        worker_id: i32,
    },
    WorkerCompleted {
        worker_id: i32,
        local_mappings: u64,
    },
    StatusUpdateRequest,
    Shutdown,
}

struct RateWindow {
    last_update: Instant,
    last_mappings: u64,
    recent_rate: f64,
}

struct StatsShared {
    total_mappings: AtomicU64,
    total_words: AtomicU64,
    highest_score_bits: AtomicU64,
    high_score_count: AtomicU64,
    active_workers: AtomicUsize,
    rate: Mutex<RateWindow>,
}

impl StatsShared {
    fn new(start: Instant) -> Self {
        StatsShared {
            total_mappings: AtomicU64::new(0),
            total_words: AtomicU64::new(0),
            highest_score_bits: AtomicU64::new(0f64.to_bits()),
            high_score_count: AtomicU64::new(0),
            active_workers: AtomicUsize::new(0),
            rate: Mutex::new(RateWindow {
                last_update: start,
                last_mappings: 0,
                recent_rate: 0.0,
            }),
        }
    }

    fn highest_score(&self) -> f64 {
        f64::from_bits(self.highest_score_bits.load(Ordering::Acquire))
    }

    /// Monotonic max over the score, CAS on the f64 bit pattern.
    fn raise_highest_score(&self, score: f64) {
        let mut current = self.highest_score_bits.load(Ordering::Acquire);
        while score > f64::from_bits(current) {
            match self.highest_score_bits.compare_exchange_weak(
                current,
                score.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

/// Point-in-time view of the aggregated counters. Eventually consistent:
/// a worker's counts become visible once its batch has been flushed.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub total_mappings: u64,
    pub total_words: u64,
    pub highest_score: f64,
    pub high_score_count: u64,
    pub active_workers: usize,
    pub start_time: Instant,
    pub last_update: Instant,
    pub last_mappings: u64,
    pub recent_rate: f64,
}

impl StatsSnapshot {
    pub fn elapsed_minutes(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 60.0
    }

    pub fn average_rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_mappings as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Cloneable submission side of the stats pipeline. Sends block until
/// queue space is available, which back-pressures a worker that produces
/// faster than the consumer can drain.
#[derive(Clone)]
pub struct StatsHandle {
    sender: Sender<StatsMessage>,
}

impl StatsHandle {
    fn submit(&self, message: StatsMessage) {
        if self.sender.send(message).is_err() {
            warn!("Stats aggregator is gone; dropping message");
        }
    }

    pub fn mapping_processed(
        &self,
        worker_id: i32,
        mapping_id: u64,
        words_validated: u64,
        score: f64,
    ) {
        self.submit(StatsMessage::MappingProcessed {
            worker_id,
            mapping_id,
            words_validated,
            score,
        });
    }

    pub fn high_score_found(&self, worker_id: i32, mapping_id: u64, result: &ValidationResult) {
        self.submit(StatsMessage::HighScoreFound {
            worker_id,
            mapping_id,
            score: result.score,
            matched_words: result.matched_words,
            total_words: result.total_words,
            match_percentage: result.match_percentage,
        });
    }

    pub fn worker_started(&self, worker_id: i32) {
        self.submit(StatsMessage::WorkerStarted { worker_id });
    }

    pub fn worker_completed(&self, worker_id: i32, local_mappings: u64) {
        self.submit(StatsMessage::WorkerCompleted {
            worker_id,
            local_mappings,
        });
    }

    pub fn request_status_update(&self) {
        self.submit(StatsMessage::StatusUpdateRequest);
    }
}

/// Per-worker batching of counters, flushed roughly once per second or at
/// block boundaries to keep the stats queue light.
pub struct WorkerBatch {
    worker_id: i32,
    mappings: u64,
    words: u64,
    highest_score: f64,
    had_high_score: bool,
    last_flush: Instant,
}

impl WorkerBatch {
    pub fn new(worker_id: i32) -> Self {
        WorkerBatch {
            worker_id,
            mappings: 0,
            words: 0,
            highest_score: 0.0,
            had_high_score: false,
            last_flush: Instant::now(),
        }
    }

    pub fn record(&mut self, result: &ValidationResult) {
        self.mappings += 1;
        self.words += result.total_words as u64;
        if result.score > self.highest_score {
            self.highest_score = result.score;
            self.had_high_score = true;
        }
    }

    pub fn flush_due(&self) -> bool {
        self.last_flush.elapsed() >= Duration::from_secs(1)
    }

    pub fn flush(&mut self, stats: &StatsHandle) {
        if self.mappings > 0 {
            stats.submit(StatsMessage::BatchStats {
                worker_id: self.worker_id,
                mappings: self.mappings,
                words: self.words,
                highest_score: self.highest_score,
                had_high_score: self.had_high_score,
            });
        }
        self.mappings = 0;
        self.words = 0;
        self.highest_score = 0.0;
        self.had_high_score = false;
        self.last_flush = Instant::now();
    }
}

/// Single-consumer aggregation of worker counters, plus a periodic status
/// line whose mappings/sec figure is the delta rate between ticks rather
/// than the whole-run average.
pub struct StatsAggregator {
    handle: StatsHandle,
    shared: Arc<StatsShared>,
    start_time: Instant,
    consumer: Option<JoinHandle<()>>,
}

impl StatsAggregator {
    pub fn start(status_interval: Duration) -> Self {
        let start_time = Instant::now();
        let shared = Arc::new(StatsShared::new(start_time));
        let (sender, receiver) = bounded(QUEUE_CAPACITY);

        let consumer_shared = shared.clone();
        let consumer = std::thread::Builder::new()
            .name("stats-aggregator".to_string())
            .spawn(move || run_consumer(receiver, consumer_shared, status_interval, start_time))
            .expect("failed to spawn stats consumer thread");

        StatsAggregator {
            handle: StatsHandle { sender },
            shared,
            start_time,
            consumer: Some(consumer),
        }
    }

    pub fn handle(&self) -> StatsHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        snapshot_of(&self.shared, self.start_time)
    }

    /// Drains outstanding messages and stops the consumer thread.
    pub fn shutdown(mut self) -> StatsSnapshot {
        self.handle.submit(StatsMessage::Shutdown);
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                warn!("Stats consumer thread panicked during shutdown");
            }
        }
        snapshot_of(&self.shared, self.start_time)
    }
}

fn snapshot_of(shared: &StatsShared, start_time: Instant) -> StatsSnapshot {
    let rate = match shared.rate.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    StatsSnapshot {
        total_mappings: shared.total_mappings.load(Ordering::Acquire),
        total_words: shared.total_words.load(Ordering::Acquire),
        highest_score: shared.highest_score(),
        high_score_count: shared.high_score_count.load(Ordering::Acquire),
        active_workers: shared.active_workers.load(Ordering::Acquire),
        start_time,
        last_update: rate.last_update,
        last_mappings: rate.last_mappings,
        recent_rate: rate.recent_rate,
    }
}

fn run_consumer(
    receiver: Receiver<StatsMessage>,
    shared: Arc<StatsShared>,
    status_interval: Duration,
    start_time: Instant,
) {
    let mut last_tick = Instant::now();

    loop {
        let wait = status_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        match receiver.recv_timeout(wait) {
            Ok(StatsMessage::Shutdown) => {
                // Drain whatever the workers managed to flush before exit.
                while let Ok(message) = receiver.try_recv() {
                    if !matches!(message, StatsMessage::Shutdown) {
                        handle_message(message, &shared, start_time);
                    }
                }
                return;
            }
            Ok(message) => handle_message(message, &shared, start_time),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if last_tick.elapsed() >= status_interval {
            update_rate(&shared);
            print_status(&shared, start_time);
            last_tick = Instant::now();
        }
    }
}

fn handle_message(message: StatsMessage, shared: &StatsShared, start_time: Instant) {
    match message {
        StatsMessage::MappingProcessed {
            words_validated,
            score,
            ..
        } => {
            shared.total_mappings.fetch_add(1, Ordering::AcqRel);
            shared.total_words.fetch_add(words_validated, Ordering::AcqRel);
            shared.raise_highest_score(score);
        }
        StatsMessage::BatchStats {
            mappings,
            words,
            highest_score,
            had_high_score,
            ..
        } => {
            shared.total_mappings.fetch_add(mappings, Ordering::AcqRel);
            shared.total_words.fetch_add(words, Ordering::AcqRel);
            if had_high_score {
                shared.raise_highest_score(highest_score);
            }
        }
        StatsMessage::HighScoreFound {
            worker_id,
            mapping_id,
            score,
            matched_words,
            total_words,
            match_percentage,
        } => {
            shared.high_score_count.fetch_add(1, Ordering::AcqRel);
            shared.raise_highest_score(score);
            info!(
                "*** HIGH SCORE *** Worker {}: Score={:.2}, Matches={}/{} ({:.1}%), Mapping={}",
                worker_id, score, matched_words, total_words, match_percentage, mapping_id
            );
        }
        StatsMessage::WorkerStarted { worker_id } => {
            shared.active_workers.fetch_add(1, Ordering::AcqRel);
            info!("Worker {} started", worker_id);
        }
        StatsMessage::WorkerCompleted {
            worker_id,
            local_mappings,
        } => {
            shared.active_workers.fetch_sub(1, Ordering::AcqRel);
            info!(
                "Worker {} completed. Processed {} mappings",
                worker_id, local_mappings
            );
        }
        StatsMessage::StatusUpdateRequest => {
            update_rate(shared);
            print_status(shared, start_time);
        }
        StatsMessage::Shutdown => {}
    }
}

fn update_rate(shared: &StatsShared) {
    let current = shared.total_mappings.load(Ordering::Acquire);
    let mut rate = match shared.rate.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };

    let elapsed = rate.last_update.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        rate.recent_rate = (current - rate.last_mappings) as f64 / elapsed;
        rate.last_mappings = current;
        rate.last_update = Instant::now();
    }
}

fn print_status(shared: &StatsShared, start_time: Instant) {
    let recent_rate = match shared.rate.lock() {
        Ok(g) => g.recent_rate,
        Err(poisoned) => poisoned.into_inner().recent_rate,
    };
    info!(
        "[{:.1}min] Mappings: {} ({:.1}/sec), Highest Score: {:.2}, Active Workers: {}",
        start_time.elapsed().as_secs_f64() / 60.0,
        shared.total_mappings.load(Ordering::Acquire),
        recent_rate,
        shared.highest_score(),
        shared.active_workers.load(Ordering::Acquire)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_flush_aggregates_into_totals() {
        let aggregator = StatsAggregator::start(Duration::from_secs(3600));
        let handle = aggregator.handle();

        let mut batch = WorkerBatch::new(0);
        batch.record(&ValidationResult {
            total_words: 7,
            matched_words: 2,
            match_percentage: 28.6,
            score: 12.5,
            is_high_score: false,
        });
        batch.record(&ValidationResult {
            total_words: 7,
            matched_words: 3,
            match_percentage: 42.9,
            score: 31.0,
            is_high_score: true,
        });
        batch.flush(&handle);
        handle.worker_started(0);
        handle.worker_completed(0, 2);

        let snapshot = aggregator.shutdown();
        assert_eq!(snapshot.total_mappings, 2);
        assert_eq!(snapshot.total_words, 14);
        assert!((snapshot.highest_score - 31.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.active_workers, 0);
    }

    #[test]
    fn high_score_messages_bump_the_counter() {
        let aggregator = StatsAggregator::start(Duration::from_secs(3600));
        let handle = aggregator.handle();

        let result = ValidationResult {
            total_words: 12,
            matched_words: 9,
            match_percentage: 75.0,
            score: 80.0,
            is_high_score: true,
        };
        handle.high_score_found(1, 42, &result);
        handle.high_score_found(2, 43, &result);

        let snapshot = aggregator.shutdown();
        assert_eq!(snapshot.high_score_count, 2);
        assert!((snapshot.highest_score - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_batch_flush_sends_nothing() {
        let aggregator = StatsAggregator::start(Duration::from_secs(3600));
        let handle = aggregator.handle();

        let mut batch = WorkerBatch::new(3);
        batch.flush(&handle);

        let snapshot = aggregator.shutdown();
        assert_eq!(snapshot.total_mappings, 0);
    }
}
