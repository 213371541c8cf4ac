use crate::alphabet::{Alphabet, PresenceVector};
use crate::consts::{ALPHABET_SIZE, VECTOR_MASK};
use crate::permute::Permutation;

/// A 27x27 binary substitution matrix, one row bitmask per source index.
/// Bit j of `rows[i]` is set iff source index i maps to target index j.
///
/// Matrices built from a `Permutation` are bijective (one bit per row and
/// per column); `set` also allows non-bijective extensions where a source
/// index fans out to several targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMatrix {
    rows: [u32; ALPHABET_SIZE],
}

impl SubstitutionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_permutation(permutation: &Permutation) -> Self {
        let mut rows = [0u32; ALPHABET_SIZE];
        for (source, row) in rows.iter_mut().enumerate() {
            *row = 1 << permutation.target_of(source);
        }
        SubstitutionMatrix { rows }
    }

    /// Marks source -> target. Out-of-range indices are ignored.
    pub fn set(&mut self, source: usize, target: usize) {
        if source < ALPHABET_SIZE && target < ALPHABET_SIZE {
            self.rows[source] |= 1 << target;
        }
    }

    pub fn row(&self, source: usize) -> u32 {
        self.rows[source]
    }

    /// Applies the matrix to a presence vector: output bit j is set iff
    /// some set input bit i has matrix[i][j] = 1. For a bijective matrix
    /// this permutes the input bits; for a fan-out matrix it ORs the
    /// selected rows together.
    pub fn apply(&self, input: PresenceVector) -> PresenceVector {
        let mut output = 0u32;
        let mut bits = input & VECTOR_MASK;
        while bits != 0 {
            let source = bits.trailing_zeros() as usize;
            output |= self.rows[source];
            bits &= bits - 1;
        }
        output
    }

    /// True iff every row and every column carries exactly one set bit.
    pub fn is_bijective(&self) -> bool {
        let mut column_union = 0u32;
        for &row in &self.rows {
            if row.count_ones() != 1 {
                return false;
            }
            column_union |= row;
        }
        column_union == VECTOR_MASK
    }

    /// Recovers the permutation when the matrix is bijective.
    pub fn to_permutation(&self) -> Option<Permutation> {
        if !self.is_bijective() {
            return None;
        }
        let mut targets = [0u8; ALPHABET_SIZE];
        for (source, &row) in self.rows.iter().enumerate() {
            targets[source] = row.trailing_zeros() as u8;
        }
        Some(Permutation(targets))
    }

    /// Renders the mapping as a two-line human-readable block: the EVA
    /// alphabet in source order, and under each symbol the Hebrew glyph it
    /// maps to. A source index with no target renders as '?'.
    pub fn descriptor(&self) -> String {
        let mut out = String::with_capacity(128);

        out.push_str("EVA:");
        for &g in Alphabet::Eva.glyphs() {
            out.push(' ');
            out.push(g);
        }
        out.push('\n');

        out.push_str("HEB:");
        for &row in &self.rows {
            out.push(' ');
            if row == 0 {
                out.push('?');
            } else {
                out.push(Alphabet::Hebrew.glyph(row.trailing_zeros() as usize));
            }
        }
        out.push('\n');

        out
    }
}

/// One enumerated candidate: the global permutation index (which doubles as
/// the mapping id in results and stats) plus its matrix form.
#[derive(Debug, Clone)]
pub struct GeneratedMapping {
    pub global_index: u64,
    pub matrix: SubstitutionMatrix,
}
