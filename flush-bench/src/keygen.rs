use std::ops::RangeInclusive;

use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

/// Bytes keys are drawn from: `'@'..='~'`, 63 printable symbols.
pub const KEY_ALPHABET: RangeInclusive<u8> = b'@'..=b'~';

pub struct KeyGenerator {
    rng: StdRng,
    alphabet: Uniform<u8>,
    key_size: usize,
}

impl KeyGenerator {
    pub fn new(key_size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        KeyGenerator {
            rng,
            alphabet: Uniform::new_inclusive(*KEY_ALPHABET.start(), *KEY_ALPHABET.end()),
            key_size,
        }
    }

    pub fn next_key(&mut self) -> Vec<u8> {
        (&mut self.rng)
            .sample_iter(&self.alphabet)
            .take(self.key_size)
            .collect()
    }
}
