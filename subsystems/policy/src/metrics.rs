//! # Policy Metrics
//!
//! Counters for what the policy engine has done since startup.

use core::sync::atomic::{AtomicU64, Ordering};

/// Policy counters
#[derive(Debug)]
pub struct PolicyMetrics {
    registrations: AtomicU64,
    deregistrations: AtomicU64,
    quantum_expiries: AtomicU64,
    demotions: AtomicU64,
    promotions: AtomicU64,
    lottery_rounds: AtomicU64,
    lottery_wins: AtomicU64,
    dispatch_failures: AtomicU64,
    rollbacks: AtomicU64,
    dead_cpus: AtomicU64,
}

/// Point-in-time copy of [`PolicyMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Processes registered
    pub registrations: u64,
    /// Processes deregistered
    pub deregistrations: u64,
    /// Quantum-expiry notifications handled
    pub quantum_expiries: u64,
    /// One-level demotions on quantum expiry
    pub demotions: u64,
    /// One-level promotions by the balancer
    pub promotions: u64,
    /// Lottery rounds run
    pub lottery_rounds: u64,
    /// Rounds that produced a winner
    pub lottery_wins: u64,
    /// Requests the dispatch kernel refused
    pub dispatch_failures: u64,
    /// Ticket adjustments rolled back
    pub rollbacks: u64,
    /// CPUs marked dead
    pub dead_cpus: u64,
}

impl PolicyMetrics {
    /// Create zeroed metrics
    pub const fn new() -> Self {
        Self {
            registrations: AtomicU64::new(0),
            deregistrations: AtomicU64::new(0),
            quantum_expiries: AtomicU64::new(0),
            demotions: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            lottery_rounds: AtomicU64::new(0),
            lottery_wins: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            dead_cpus: AtomicU64::new(0),
        }
    }

    /// Record a registration
    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deregistration
    pub fn record_deregistration(&self) {
        self.deregistrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a quantum expiry
    pub fn record_quantum_expiry(&self) {
        self.quantum_expiries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a demotion
    pub fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a promotion
    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lottery round and whether it had a winner
    pub fn record_lottery(&self, won: bool) {
        self.lottery_rounds.fetch_add(1, Ordering::Relaxed);
        if won {
            self.lottery_wins.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a refused dispatch
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rollback
    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a CPU marked dead
    pub fn record_dead_cpu(&self) {
        self.dead_cpus.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            deregistrations: self.deregistrations.load(Ordering::Relaxed),
            quantum_expiries: self.quantum_expiries.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            lottery_rounds: self.lottery_rounds.load(Ordering::Relaxed),
            lottery_wins: self.lottery_wins.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            dead_cpus: self.dead_cpus.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.registrations,
            &self.deregistrations,
            &self.quantum_expiries,
            &self.demotions,
            &self.promotions,
            &self.lottery_rounds,
            &self.lottery_wins,
            &self.dispatch_failures,
            &self.rollbacks,
            &self.dead_cpus,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PolicyMetrics {
    fn default() -> Self {
        Self::new()
    }
}
