//! Identifier allocation for elements that need a hook and for generated
//! classes.
//!
//! Element ids and class names live in separate namespaces, each with its
//! own counter. With [`IdStrategy::Sequential`] the counter is part of the
//! token, so two tokens from one namespace can never be equal; the random
//! suffix only keeps ids from looking guessable. [`IdStrategy::Random`]
//! tokens carry no counter and are re-drawn against the set already issued.

use crate::config::{IdConfig, IdStrategy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 4;
const TOKEN_LEN: usize = 6;

#[derive(Debug)]
struct Namespace {
    prefix: String,
    counter: u64,
    issued: HashSet<String>,
}

impl Namespace {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counter: 0,
            issued: HashSet::new(),
        }
    }

    fn next(&mut self, strategy: IdStrategy, rng: &mut StdRng) -> String {
        self.counter += 1;
        match strategy {
            IdStrategy::Sequential => format!(
                "{}-{}-{}",
                self.prefix,
                self.counter,
                base36(rng, SUFFIX_LEN)
            ),
            IdStrategy::Random => loop {
                let token = format!("_{}", base36(rng, TOKEN_LEN));
                if self.issued.insert(token.clone()) {
                    break token;
                }
            },
        }
    }
}

#[derive(Debug)]
pub struct IdAllocator {
    strategy: IdStrategy,
    elements: Namespace,
    classes: Namespace,
    rng: StdRng,
}

impl IdAllocator {
    pub fn new(config: &IdConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            strategy: config.strategy,
            elements: Namespace::new(&config.element_prefix),
            classes: Namespace::new(&config.class_prefix),
            rng,
        }
    }

    pub fn allocate_element_id(&mut self) -> String {
        self.elements.next(self.strategy, &mut self.rng)
    }

    pub fn allocate_class_name(&mut self) -> String {
        self.classes.next(self.strategy, &mut self.rng)
    }

    pub fn elements_issued(&self) -> u64 {
        self.elements.counter
    }

    pub fn classes_issued(&self) -> u64 {
        self.classes.counter
    }
}

fn base36(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
