use crate::alphabet::{Alphabet, PresenceVector};
use crate::corpus::WordCorpus;
use crate::error::{CfResult, CipherForgeError};
use crate::mapping::SubstitutionMatrix;
use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

/// Which translation kernel to run. The core only ever consumes the
/// `translate` contract, so an accelerator slots in behind the same
/// interface; this build ships the CPU kernel only.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorBackend {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

#[derive(Debug, Clone)]
pub struct TranslationStats {
    pub words_translated: usize,
    pub elapsed_ms: f64,
    pub words_per_second: f64,
    pub backend: &'static str,
}

/// Applies one mapping (or a batch of mappings) to the shared source
/// corpus, producing one 27-bit output vector per word.
#[derive(Debug, Clone)]
pub struct Translator {
    use_gpu: bool,
}

impl Translator {
    /// Resolves the backend selector. Forcing GPU on a build without an
    /// accelerator fails construction; AUTO falls back to CPU.
    pub fn new(backend: TranslatorBackend) -> CfResult<Self> {
        let use_gpu = match backend {
            TranslatorBackend::Cpu => false,
            TranslatorBackend::Gpu => {
                if !Self::gpu_available() {
                    return Err(CipherForgeError::Backend(
                        "GPU backend requested but no accelerator is linked into this build"
                            .to_string(),
                    ));
                }
                true
            }
            TranslatorBackend::Auto => Self::gpu_available(),
        };
        Ok(Translator { use_gpu })
    }

    /// Accelerator probe. Always false until a GPU kernel is linked in.
    pub fn gpu_available() -> bool {
        false
    }

    pub fn backend_name(&self) -> &'static str {
        if self.use_gpu {
            "GPU"
        } else {
            "CPU"
        }
    }

    /// Translates the whole corpus under one mapping. The corpus alphabet
    /// check is advisory only; translation proceeds regardless.
    pub fn translate(
        &self,
        corpus: &WordCorpus,
        matrix: &SubstitutionMatrix,
    ) -> Vec<PresenceVector> {
        let mut output = Vec::with_capacity(corpus.len());
        self.translate_into(corpus, matrix, &mut output);
        output
    }

    /// Hot-path variant that reuses the caller's output buffer: 27 bitwise
    /// operations per word, no allocation.
    pub fn translate_into(
        &self,
        corpus: &WordCorpus,
        matrix: &SubstitutionMatrix,
        output: &mut Vec<PresenceVector>,
    ) {
        if corpus.alphabet() != Alphabet::Eva {
            warn!("Translating a corpus that is not in the EVA alphabet");
        }

        output.clear();
        output.extend(corpus.words().iter().map(|w| matrix.apply(w.vector)));
    }

    /// Applies M mappings to the corpus, one output row per mapping.
    /// Mappings fan out across the thread pool; each row is independent.
    pub fn translate_batch(
        &self,
        corpus: &WordCorpus,
        matrices: &[SubstitutionMatrix],
    ) -> Vec<Vec<PresenceVector>> {
        matrices
            .par_iter()
            .map(|matrix| self.translate(corpus, matrix))
            .collect()
    }

    pub fn translate_with_stats(
        &self,
        corpus: &WordCorpus,
        matrix: &SubstitutionMatrix,
    ) -> (Vec<PresenceVector>, TranslationStats) {
        let start = Instant::now();
        let output = self.translate(corpus, matrix);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let stats = TranslationStats {
            words_translated: output.len(),
            elapsed_ms,
            words_per_second: if elapsed_ms > 0.0 {
                output.len() as f64 * 1000.0 / elapsed_ms
            } else {
                0.0
            },
            backend: self.backend_name(),
        };
        (output, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permute::Permutation;

    #[test]
    fn forced_gpu_fails_without_accelerator() {
        assert!(Translator::new(TranslatorBackend::Gpu).is_err());
    }

    #[test]
    fn auto_falls_back_to_cpu() {
        let t = Translator::new(TranslatorBackend::Auto).unwrap();
        assert_eq!(t.backend_name(), "CPU");
    }

    #[test]
    fn batch_matches_single_mapping_path() {
        let corpus = WordCorpus::from_text("abc\nqo\nz", Alphabet::Eva);
        let t = Translator::new(TranslatorBackend::Cpu).unwrap();

        let m1 = SubstitutionMatrix::from_permutation(&Permutation::identity());
        let m2 = SubstitutionMatrix::from_permutation(&crate::permute::permutation_at(42));

        let batch = t.translate_batch(&corpus, &[m1.clone(), m2.clone()]);
        assert_eq!(batch[0], t.translate(&corpus, &m1));
        assert_eq!(batch[1], t.translate(&corpus, &m2));
    }
}
