use crate::alphabet::PresenceVector;
use crate::lexicon::Lexicon;
use crate::mapping::SubstitutionMatrix;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Outcome of scoring one translated corpus against the lexicon.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValidationResult {
    pub total_words: usize,
    pub matched_words: usize,
    pub match_percentage: f64,
    pub score: f64,
    pub is_high_score: bool,
}

/// Score formula: match percentage, plus a sub-linear bonus for absolute
/// hit count, minus a reliability penalty for corpora under 10 words.
/// Clamped to [0, 100].
pub fn compute_score(matched_words: usize, total_words: usize) -> f64 {
    if total_words == 0 {
        return 0.0;
    }

    let percentage = matched_words as f64 / total_words as f64 * 100.0;
    let match_bonus = (matched_words as f64 + 1.0).log10() * 5.0;
    let length_penalty = if total_words < 10 {
        (10 - total_words) as f64 * 2.0
    } else {
        0.0
    };

    (percentage + match_bonus - length_penalty).clamp(0.0, 100.0)
}

/// Append-only sink for high-scoring mappings. One instance is shared by
/// all workers; the mutex serializes file appends only, so per-worker
/// validation state never contends on it.
#[derive(Debug)]
pub struct ResultsWriter {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl ResultsWriter {
    pub fn new(path: PathBuf) -> Self {
        ResultsWriter {
            path,
            file_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one human-readable record block. Best-effort: an I/O
    /// failure is logged and the score is simply not persisted.
    pub fn append(
        &self,
        mapping_id: u64,
        result: &ValidationResult,
        descriptor: &str,
    ) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let rule = "=".repeat(80);
        let record = format!(
            "{rule}\nDate/Time: {timestamp}\nMapping ID: {mapping_id}\nScore: {:.2}% ({}/{} matches)\n{rule}\n{descriptor}\n",
            result.score, result.matched_words, result.total_words,
        );

        let guard = self.file_lock.lock();
        let _guard = match guard {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let write_result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(record.as_bytes()));

        if let Err(e) = write_result {
            warn!("Failed to append result to {:?}: {}", self.path, e);
        }
    }
}

/// Scores translated corpora against the shared lexicon and persists
/// qualifying mappings. Each worker owns one; the lexicon and results
/// writer are shared by reference.
pub struct Validator {
    lexicon: Arc<Lexicon>,
    writer: Arc<ResultsWriter>,
    score_threshold: f64,
    save_results: bool,
}

impl Validator {
    pub fn new(
        lexicon: Arc<Lexicon>,
        writer: Arc<ResultsWriter>,
        score_threshold: f64,
        save_results: bool,
    ) -> Self {
        Validator {
            lexicon,
            writer,
            score_threshold,
            save_results,
        }
    }

    /// Counts lexicon hits over the translated vectors and derives the
    /// score. All-zero vectors carry no signal and never count as matches.
    pub fn validate(&self, translated: &[PresenceVector]) -> ValidationResult {
        let total_words = translated.len();
        let matched_words = translated
            .iter()
            .filter(|&&v| v != 0 && self.lexicon.contains(v))
            .count();

        let match_percentage = if total_words > 0 {
            matched_words as f64 / total_words as f64 * 100.0
        } else {
            0.0
        };
        let score = compute_score(matched_words, total_words);

        ValidationResult {
            total_words,
            matched_words,
            match_percentage,
            score,
            is_high_score: score >= self.score_threshold,
        }
    }

    /// Validates and, when the score clears the threshold, appends a record
    /// with the mapping's descriptor. The descriptor is only rendered on
    /// the rare persist path, never in the hot loop.
    pub fn validate_mapping(
        &self,
        translated: &[PresenceVector],
        mapping_id: u64,
        matrix: &SubstitutionMatrix,
    ) -> ValidationResult {
        let result = self.validate(translated);
        if result.is_high_score && self.save_results {
            self.writer.append(mapping_id, &result, &matrix.descriptor());
        }
        result
    }
}
