/// Width of both alphabets: EVA (a-z plus space) and Hebrew
/// (22 letters plus 5 final forms).
pub const ALPHABET_SIZE: usize = 27;

/// Bitmask covering all 27 alphabet positions of a presence vector.
pub const VECTOR_MASK: u32 = (1 << ALPHABET_SIZE) - 1;

/// Size of the enumerated search space. The true count of bijections is
/// 27!, which exceeds u64; the enumeration is capped at this constant (the
/// leading twenty digits of 27!), carried over from the checkpoint format.
pub const TOTAL_PERMUTATIONS: u64 = 10_888_869_450_418_352_160;

/// Default number of mappings per scheduler block.
pub const DEFAULT_BLOCK_SIZE: u64 = 1_000_000;

/// Default minimum score for a mapping to be persisted.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 25.0;

/// Default interval between status lines from the stats aggregator.
pub const DEFAULT_STATUS_INTERVAL_MS: u64 = 5000;

/// Sentinel worker id for an unassigned block.
pub const UNASSIGNED_WORKER: i32 = -1;
