//! Research memory — the per-session record of what has been established.

use super::router::RouteName;
use serde::{Deserialize, Serialize};

/// A verifiable assertion extracted from a browsing result.
///
/// Identity is full structural equality: two facts differing only in year are
/// distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub fact: String,
    pub source: String,
    pub year: i64,
}

impl Fact {
    pub fn new(fact: impl Into<String>, source: impl Into<String>, year: i64) -> Self {
        Self {
            fact: fact.into(),
            source: source.into(),
            year,
        }
    }
}

/// Accumulated state of one research session.
///
/// Invariants: `verified_facts` holds no two equal facts, and `route_history`
/// has one entry per completed iteration. `pending_verifications` and
/// `contradictions` are carried but never written by the loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchMemory {
    verified_facts: Vec<Fact>,
    pending_verifications: Vec<String>,
    contradictions: Vec<String>,
    route_history: Vec<RouteName>,
}

impl ResearchMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fact` unless an equal fact is already present.
    ///
    /// Returns `true` when the fact was added.
    pub fn add_fact(&mut self, fact: Fact) -> bool {
        if self.verified_facts.contains(&fact) {
            return false;
        }
        self.verified_facts.push(fact);
        true
    }

    /// Merge facts in order, skipping duplicates. Returns how many were added.
    pub fn merge_facts(&mut self, facts: impl IntoIterator<Item = Fact>) -> usize {
        facts.into_iter().filter(|f| self.add_fact(f.clone())).count()
    }

    pub fn record_route(&mut self, route: RouteName) {
        self.route_history.push(route);
    }

    pub fn verified_facts(&self) -> &[Fact] {
        &self.verified_facts
    }

    pub fn pending_verifications(&self) -> &[String] {
        &self.pending_verifications
    }

    pub fn contradictions(&self) -> &[String] {
        &self.contradictions
    }

    pub fn route_history(&self) -> &[RouteName] {
        &self.route_history
    }

    /// The route chosen most recently, if any iteration has completed.
    pub fn last_route(&self) -> Option<RouteName> {
        self.route_history.last().copied()
    }
}
