//! Pending-work bookkeeping for one scan.

use std::collections::HashSet;

use tracing::trace;

/// LIFO work stack, its membership mirror and the visited set.
///
/// Seeds are pushed in reverse so the first seed is popped first. An
/// address is scheduled at most once while pending and never after it has
/// been decoded.
#[derive(Debug, Default)]
pub struct Traversal {
    stack: Vec<u64>,
    queued: HashSet<u64>,
    visited: HashSet<u64>,
}

impl Traversal {
    /// Seed the stack with already-deduplicated addresses in discovery order.
    pub fn from_seeds(seeds: &[u64]) -> Self {
        let mut traversal = Self::default();
        for &addr in seeds.iter().rev() {
            if traversal.queued.insert(addr) {
                traversal.stack.push(addr);
            }
        }
        traversal
    }

    /// Queue `addr` unless it is pending or already decoded.
    pub fn schedule(&mut self, addr: u64) -> bool {
        if self.visited.contains(&addr) || !self.queued.insert(addr) {
            return false;
        }
        trace!("scheduled {:#x}", addr);
        self.stack.push(addr);
        true
    }

    pub fn pop(&mut self) -> Option<u64> {
        let addr = self.stack.pop()?;
        self.queued.remove(&addr);
        Some(addr)
    }

    /// Record `addr` as decoded. Returns false if it already was.
    pub fn mark_visited(&mut self, addr: u64) -> bool {
        self.visited.insert(addr)
    }

    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}
