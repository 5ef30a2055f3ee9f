//! Request stimulus sources.
//!
//! Once per clock edge the driver asks a [`StimulusSource`] for the request
//! lines to apply next. The trait abstracts where the values come from: a
//! seeded random generator for constrained-random runs, or a fixed script
//! for directed tests.

use std::collections::VecDeque;

use arbiter_types::{BitVector, BitsError, RequestVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{HarnessConfig, StimulusMode};

/// Errors raised while producing stimulus.
#[derive(Debug, thiserror::Error)]
pub enum StimulusError {
    /// A request could not be built at the configured width.
    #[error("stimulus width error: {source}")]
    Width {
        /// The underlying width error.
        #[from]
        source: BitsError,
    },

    /// The stimulus configuration could not be turned into a source.
    #[error("stimulus configuration error: {message}")]
    Config {
        /// Description of the failure.
        message: String,
    },
}

/// A source of request vectors.
pub trait StimulusSource: Send {
    /// Number of request lines each produced vector has.
    fn width(&self) -> usize;

    /// Produce the request lines for the next clock edge.
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError`] if no vector can be produced.
    fn next_request(&mut self) -> Result<RequestVector, StimulusError>;
}

/// Uniformly random requests from a seeded generator.
///
/// Every bit is drawn independently with probability one half, which is the
/// same as drawing the whole vector uniformly from `0..2^N`. The same seed
/// always yields the same sequence.
#[derive(Debug, Clone)]
pub struct RandomStimulus {
    /// Request width.
    width: usize,
    /// Storage words per vector.
    words: usize,
    /// Seed the generator was created from.
    seed: u64,
    /// The generator.
    rng: StdRng,
}

impl RandomStimulus {
    /// Create a random source for `width` request lines.
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError::Width`] if `width` is 0.
    pub fn new(width: usize, seed: u64) -> Result<Self, StimulusError> {
        let words = BitVector::zeros(width)?.words().len();
        Ok(Self {
            width,
            words,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Return the seed this source was created from.
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl StimulusSource for RandomStimulus {
    fn width(&self) -> usize {
        self.width
    }

    fn next_request(&mut self) -> Result<RequestVector, StimulusError> {
        let raw: Vec<u64> = (0..self.words).map(|_| self.rng.random()).collect();
        let bits = BitVector::from_words_masked(self.width, raw)?;
        Ok(RequestVector::from_bits(bits))
    }
}

/// Replays a fixed list of requests, then holds every line low.
#[derive(Debug, Clone)]
pub struct ScriptedStimulus {
    /// Remaining scripted requests.
    script: VecDeque<RequestVector>,
    /// Value applied once the script is exhausted.
    idle: RequestVector,
}

impl ScriptedStimulus {
    /// Create a scripted source.
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError::Width`] if `width` is 0 or any scripted
    /// request is not exactly `width` bits.
    pub fn new(width: usize, script: Vec<RequestVector>) -> Result<Self, StimulusError> {
        let idle = RequestVector::zeros(width)?;
        for request in &script {
            request.bits().ensure_width(width)?;
        }
        Ok(Self {
            script: script.into(),
            idle,
        })
    }

    /// Number of scripted requests not yet applied.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl StimulusSource for ScriptedStimulus {
    fn width(&self) -> usize {
        self.idle.width()
    }

    fn next_request(&mut self) -> Result<RequestVector, StimulusError> {
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| self.idle.clone()))
    }
}

/// Build the stimulus source described by `config`.
///
/// # Errors
///
/// Returns [`StimulusError::Config`] if the script cannot be parsed, or
/// [`StimulusError::Width`] for a zero width.
pub fn from_config(config: &HarnessConfig) -> Result<Box<dyn StimulusSource>, StimulusError> {
    let width = config.arbiter.requesters;
    match config.stimulus.mode {
        StimulusMode::Random => Ok(Box::new(RandomStimulus::new(width, config.stimulus.seed)?)),
        StimulusMode::Scripted => {
            let script = config
                .scripted_requests()
                .map_err(|e| StimulusError::Config {
                    message: e.to_string(),
                })?;
            Ok(Box::new(ScriptedStimulus::new(width, script)?))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn req(s: &str) -> RequestVector {
        s.parse().unwrap()
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomStimulus::new(4, 7).unwrap();
        let mut b = RandomStimulus::new(4, 7).unwrap();
        for _ in 0..50 {
            assert_eq!(a.next_request().unwrap(), b.next_request().unwrap());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = RandomStimulus::new(16, 1).unwrap();
        let mut b = RandomStimulus::new(16, 2).unwrap();
        let sa: Vec<_> = (0..20).map(|_| a.next_request().unwrap()).collect();
        let sb: Vec<_> = (0..20).map(|_| b.next_request().unwrap()).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn random_requests_cover_the_input_space() {
        let mut source = RandomStimulus::new(4, 42).unwrap();
        let mut seen = [false; 16];
        for _ in 0..1000 {
            let value = source.next_request().unwrap().bits().to_u64().unwrap();
            seen[usize::try_from(value).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s), "some of the 16 values never appeared");
    }

    #[test]
    fn random_requests_respect_width() {
        let mut source = RandomStimulus::new(70, 3).unwrap();
        for _ in 0..20 {
            let request = source.next_request().unwrap();
            assert_eq!(request.width(), 70);
            assert!(request.bits().iter_ones().all(|i| i < 70));
        }
    }

    #[test]
    fn zero_width_random_is_rejected() {
        assert!(RandomStimulus::new(0, 1).is_err());
    }

    #[test]
    fn script_replays_then_idles() {
        let mut source =
            ScriptedStimulus::new(4, vec![req("0010"), req("0101"), req("1000")]).unwrap();
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.next_request().unwrap(), req("0010"));
        assert_eq!(source.next_request().unwrap(), req("0101"));
        assert_eq!(source.next_request().unwrap(), req("1000"));
        assert_eq!(source.next_request().unwrap(), req("0000"));
        assert_eq!(source.next_request().unwrap(), req("0000"));
    }

    #[test]
    fn script_width_is_checked() {
        let err = ScriptedStimulus::new(4, vec![req("01")]);
        assert!(matches!(err, Err(StimulusError::Width { .. })));
    }

    #[test]
    fn from_config_picks_the_mode() {
        let config = HarnessConfig::parse(
            "stimulus:\n  mode: scripted\n  script: [\"1000\"]\n",
        )
        .unwrap();
        let mut source = from_config(&config).unwrap();
        assert_eq!(source.width(), 4);
        assert_eq!(source.next_request().unwrap(), req("1000"));

        let config = HarnessConfig::default();
        let mut source = from_config(&config).unwrap();
        let mut reference = RandomStimulus::new(4, 42).unwrap();
        assert_eq!(
            source.next_request().unwrap(),
            reference.next_request().unwrap()
        );
    }
}
