//! Server-side name generation for `metadata.generateName`.
//!
//! # Responsibility
//! - Derive `<prefix><random suffix>` names that are free in a collection.
//!
//! # Invariants
//! - Callers must hold the collection's mutation lock while generating and
//!   inserting, otherwise two creates can pick the same free name.
//! - Retries are bounded; exhaustion is reported, never looped forever.

use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Suffix alphabet without vowels and look-alike digits.
pub const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
pub const SUFFIX_LEN: usize = 5;
/// Longest prefix kept so generated names fit in 63 characters.
pub const MAX_GENERATED_PREFIX_LEN: usize = 63 - SUFFIX_LEN;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Generator could not find a free name within its attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGenerationError {
    pub prefix: String,
    pub attempts: u32,
}

impl Display for NameGenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "could not generate a unique name for prefix `{}` after {} attempts",
            self.prefix, self.attempts
        )
    }
}

impl Error for NameGenerationError {}

/// Random-suffix name generator with a bounded retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameGenerator {
    max_attempts: u32,
    seed: Option<u64>,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
        }
    }
}

impl NameGenerator {
    /// Creates a generator; an attempt budget of zero is raised to one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            seed: None,
        }
    }

    /// Pins the suffix sequence: every call replays the same candidates.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Generates a name not reported as taken by `is_taken`.
    pub fn generate(
        &self,
        prefix: &str,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, NameGenerationError> {
        self.try_generate(prefix, |candidate| Ok(is_taken(candidate)))
    }

    /// Like [`NameGenerator::generate`], for lookups that can fail.
    ///
    /// Lookup errors abort generation and are returned as-is.
    pub fn try_generate<E: From<NameGenerationError>>(
        &self,
        prefix: &str,
        is_taken: impl FnMut(&str) -> Result<bool, E>,
    ) -> Result<String, E> {
        match self.seed {
            Some(seed) => {
                self.try_generate_with_rng(&mut StdRng::seed_from_u64(seed), prefix, is_taken)
            }
            None => self.try_generate_with_rng(&mut rand::thread_rng(), prefix, is_taken),
        }
    }

    /// Same as [`NameGenerator::generate`] with a caller-provided RNG.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        prefix: &str,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, NameGenerationError> {
        self.try_generate_with_rng(rng, prefix, |candidate| Ok(is_taken(candidate)))
    }

    fn try_generate_with_rng<R: Rng + ?Sized, E: From<NameGenerationError>>(
        &self,
        rng: &mut R,
        prefix: &str,
        mut is_taken: impl FnMut(&str) -> Result<bool, E>,
    ) -> Result<String, E> {
        let base = truncate_prefix(prefix);
        for _ in 0..self.max_attempts {
            let candidate = format!("{base}{}", random_suffix(rng));
            if !is_taken(&candidate)? {
                return Ok(candidate);
            }
        }

        warn!(
            "event=name_generate module=names status=error prefix={} attempts={} error_code=name_generation_exhausted",
            base, self.max_attempts
        );
        Err(NameGenerationError {
            prefix: prefix.to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }
}

fn truncate_prefix(prefix: &str) -> &str {
    match prefix.char_indices().nth(MAX_GENERATED_PREFIX_LEN) {
        Some((index, _)) => &prefix[..index],
        None => prefix,
    }
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        NameGenerationError, NameGenerator, MAX_GENERATED_PREFIX_LEN, SUFFIX_ALPHABET, SUFFIX_LEN,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn generated_name_keeps_prefix_and_uses_suffix_alphabet() {
        let name = NameGenerator::default().generate("test-", |_| false).unwrap();

        assert!(name.starts_with("test-"));
        let suffix = &name["test-".len()..];
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn retries_past_taken_names() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = NameGenerator::default()
            .generate_with_rng(&mut StdRng::seed_from_u64(7), "d-", |_| false)
            .unwrap();

        let taken: HashSet<String> = [first.clone()].into_iter().collect();
        let second = NameGenerator::default()
            .generate_with_rng(&mut rng, "d-", |candidate| taken.contains(candidate))
            .unwrap();

        assert_ne!(first, second);
        assert!(second.starts_with("d-"));
    }

    #[test]
    fn exhaustion_reports_prefix_and_attempts() {
        let calls = Cell::new(0);
        let err = NameGenerator::new(3)
            .generate("full-", |_| {
                calls.set(calls.get() + 1);
                true
            })
            .unwrap_err();

        assert_eq!(calls.get(), 3);
        assert_eq!(err.prefix, "full-");
        assert_eq!(err.attempts, 3);
    }

    #[test]
    fn zero_attempt_budget_still_tries_once() {
        assert_eq!(NameGenerator::new(0).max_attempts(), 1);
    }

    #[test]
    fn seeded_generator_replays_the_same_candidates() {
        let names = NameGenerator::new(1).with_seed(42);
        let first = names.generate("s-", |_| false).unwrap();
        let second = names.generate("s-", |_| false).unwrap();
        assert_eq!(first, second);

        let err = names.generate("s-", |candidate| candidate == first).unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn lookup_errors_abort_generation() {
        let calls = Cell::new(0);
        let err = NameGenerator::new(5)
            .try_generate("e-", |_| {
                calls.set(calls.get() + 1);
                Err::<bool, _>(LookupError)
            })
            .unwrap_err();

        assert_eq!(err, LookupError);
        assert_eq!(calls.get(), 1);
    }

    #[derive(Debug, PartialEq, Eq)]
    struct LookupError;

    impl From<NameGenerationError> for LookupError {
        fn from(_: NameGenerationError) -> Self {
            Self
        }
    }

    #[test]
    fn long_prefix_is_truncated() {
        let prefix = "p".repeat(100);
        let name = NameGenerator::default().generate(&prefix, |_| false).unwrap();
        assert_eq!(name.len(), MAX_GENERATED_PREFIX_LEN + SUFFIX_LEN);
    }
}
