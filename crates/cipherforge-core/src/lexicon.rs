use crate::alphabet::{Alphabet, PresenceVector};
use crate::consts::{ALPHABET_SIZE, VECTOR_MASK};
use crate::corpus::WordCorpus;
use crate::error::CfResult;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// 32-bit fingerprint of a presence vector: polynomial rolling hash over
/// the set-bit indices, base 31. The `+ 1` keeps position 0 contributing.
pub fn fingerprint_hash(vector: PresenceVector) -> u32 {
    let mut hash = 0u32;
    for i in 0..ALPHABET_SIZE as u32 {
        if vector & (1 << i) != 0 {
            hash = hash.wrapping_mul(31).wrapping_add(i + 1);
        }
    }
    hash
}

/// 64-bit fingerprint: the vector itself in the low 27 bits, and the sum
/// of (i+1)^2 over set bits in the high 32. The sum tops out below 2^15,
/// so the shift can never overflow.
pub fn fingerprint_signature(vector: PresenceVector) -> u64 {
    let mut weighted = 0u64;
    for i in 0..ALPHABET_SIZE as u64 {
        if vector & (1 << i) != 0 {
            weighted += (i + 1) * (i + 1);
        }
    }
    (weighted << 32) | u64::from(vector & VECTOR_MASK)
}

/// Immutable set of target-word fingerprints, built once at startup and
/// shared read-only by all workers. Membership requires BOTH the hash and
/// the signature to hit; the two sets are independent, which admits a
/// vanishingly rare cross-word false positive in exchange for two O(1)
/// lookups.
#[derive(Debug, Default)]
pub struct Lexicon {
    hashes: HashSet<u32>,
    signatures: HashSet<u64>,
    word_count: usize,
}

impl Lexicon {
    /// Builds the lexicon from a word file in the target alphabet. An empty
    /// or signal-free file still yields a loaded (zero-entry) lexicon; only
    /// an unreadable file is an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CfResult<Self> {
        let corpus = WordCorpus::load_from_file(path.as_ref(), Alphabet::Hebrew)?;
        let lexicon = Self::from_corpus(&corpus);

        if lexicon.word_count == 0 {
            warn!("No lexicon words loaded from {:?}", path.as_ref());
        } else {
            info!(
                "Lexicon loaded: {} words, {} unique hashes, {} unique signatures",
                lexicon.word_count,
                lexicon.hashes.len(),
                lexicon.signatures.len()
            );
        }

        Ok(lexicon)
    }

    pub fn from_corpus(corpus: &WordCorpus) -> Self {
        let mut lexicon = Lexicon::default();
        for word in corpus.words() {
            lexicon.insert_vector(word.vector);
        }
        lexicon
    }

    pub fn insert_vector(&mut self, vector: PresenceVector) {
        if vector == 0 {
            return;
        }
        self.hashes.insert(fingerprint_hash(vector));
        self.signatures.insert(fingerprint_signature(vector));
        self.word_count += 1;
    }

    /// O(1) membership test: both fingerprints of the vector must be known.
    pub fn contains(&self, vector: PresenceVector) -> bool {
        self.hashes.contains(&fingerprint_hash(vector))
            && self.signatures.contains(&fingerprint_signature(vector))
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }
}
