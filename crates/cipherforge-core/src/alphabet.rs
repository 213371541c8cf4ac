use crate::consts::{ALPHABET_SIZE, VECTOR_MASK};
use serde::{Deserialize, Serialize};

/// A 27-bit value where bit i is set iff the word contains the character
/// mapped to index i of its alphabet. Order within the word is discarded.
pub type PresenceVector = u32;

/// EVA glyphs in index order: a-z, then space as the 27th symbol.
const EVA_GLYPHS: [char; ALPHABET_SIZE] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', ' ',
];

/// Hebrew glyphs in index order: aleph through tav, then the five final
/// forms (kaf, mem, nun, pe, tsadi).
const HEBREW_GLYPHS: [char; ALPHABET_SIZE] = [
    'א', 'ב', 'ג', 'ד', 'ה', 'ו', 'ז', 'ח', 'ט', 'י', 'כ', 'ל', 'מ', 'נ', 'ס', 'ע', 'פ', 'צ', 'ק',
    'ר', 'ש', 'ת', 'ך', 'ם', 'ן', 'ף', 'ץ',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alphabet {
    Eva,
    Hebrew,
}

impl Alphabet {
    /// Index of a character within this alphabet, or None for characters
    /// outside it (which callers ignore).
    pub fn index_of(self, ch: char) -> Option<usize> {
        match self {
            Alphabet::Eva => match ch {
                'a'..='z' => Some(ch as usize - 'a' as usize),
                ' ' => Some(26),
                _ => None,
            },
            Alphabet::Hebrew => HEBREW_GLYPHS.iter().position(|&g| g == ch),
        }
    }

    pub fn glyph(self, index: usize) -> char {
        self.glyphs()[index]
    }

    pub fn glyphs(self) -> &'static [char; ALPHABET_SIZE] {
        match self {
            Alphabet::Eva => &EVA_GLYPHS,
            Alphabet::Hebrew => &HEBREW_GLYPHS,
        }
    }
}

/// Builds the presence vector of a word. Characters outside the alphabet
/// are ignored; an all-zero result means the word carries no usable signal.
pub fn presence_vector(text: &str, alphabet: Alphabet) -> PresenceVector {
    let mut vector = 0u32;
    for ch in text.chars() {
        if let Some(index) = alphabet.index_of(ch) {
            vector |= 1 << index;
        }
    }
    vector & VECTOR_MASK
}
