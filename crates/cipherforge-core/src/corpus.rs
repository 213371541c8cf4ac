use crate::alphabet::{presence_vector, Alphabet, PresenceVector};
use crate::error::CfResult;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// One corpus word: the source text plus its precomputed presence vector.
/// Words whose vector is all-zero never make it into a corpus.
#[derive(Debug, Clone)]
pub struct SourceWord {
    pub text: String,
    pub vector: PresenceVector,
}

/// The fixed word list a search runs against. Loaded once at startup and
/// shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct WordCorpus {
    alphabet: Alphabet,
    words: Vec<SourceWord>,
}

impl WordCorpus {
    /// Reads one word per line from a UTF-8 text file. A leading BOM is
    /// honored, blank lines are skipped, and lines that contain no alphabet
    /// character at all are silently dropped.
    pub fn load_from_file<P: AsRef<Path>>(path: P, alphabet: Alphabet) -> CfResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let corpus = Self::from_text(&raw, alphabet);

        debug!(
            "Loaded corpus from {:?}: {} words",
            path.as_ref(),
            corpus.len()
        );
        if corpus.is_empty() {
            warn!("Corpus {:?} contains no usable words", path.as_ref());
        }

        Ok(corpus)
    }

    pub fn from_text(text: &str, alphabet: Alphabet) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let words = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let vector = presence_vector(line, alphabet);
                if vector == 0 {
                    None
                } else {
                    Some(SourceWord {
                        text: line.to_string(),
                        vector,
                    })
                }
            })
            .collect();

        WordCorpus { alphabet, words }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn words(&self) -> &[SourceWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
