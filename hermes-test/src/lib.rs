//! Fixtures shared by the tests of the hermes crates.

pub mod fake;
pub mod queries;

pub use queries::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc
};

/// A call counter that can be shared between a test and the exchanges it builds.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    n: Arc<AtomicUsize>
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.n.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.n.load(Ordering::SeqCst)
    }
}

impl PartialEq<usize> for Counter {
    fn eq(&self, other: &usize) -> bool {
        self.get() == *other
    }
}
