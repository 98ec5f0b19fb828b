//! # Queue Balancer
//!
//! Processes that keep exhausting their quantum outside the user band sink
//! one queue per expiry. Every balance interval the sweep lifts each of them
//! one queue back toward its ceiling, so none of them starves. Processes in
//! the user band are left to the lottery.

use crate::dispatch::{ChangeSet, Kernel};
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use alloc::vec::Vec;

/// Periodic balance timer.
///
/// Holds the next deadline in kernel ticks. The owner checks it on every
/// tick, runs the sweep when due and re-arms it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceTimer {
    interval: u64,
    deadline: Option<u64>,
}

impl BalanceTimer {
    /// Create a disarmed timer firing every `interval` ticks
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            deadline: None,
        }
    }

    /// Interval in ticks
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Next deadline, if armed
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Whether the timer will fire
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire one interval after `now`
    pub fn arm(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.interval));
    }

    /// Alias of [`arm`](Self::arm), used after a sweep
    pub fn rearm(&mut self, now: u64) {
        self.arm(now);
    }

    /// Stop firing
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the deadline has passed at `now`
    pub fn is_due(&self, now: u64) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Arm the balance timer using the kernel's tick rate
    pub fn start_balancing(&mut self, now: u64) {
        let interval = self.config.balance_interval_ticks(self.kernel.tick_rate());
        let mut timer = BalanceTimer::new(interval);
        timer.arm(now);
        log::debug!("balance timer armed, every {} ticks", timer.interval());
        self.balance_timer = Some(timer);
    }

    /// Cancel the balance timer
    pub fn stop_balancing(&mut self) {
        if let Some(timer) = self.balance_timer.as_mut() {
            timer.cancel();
        }
    }

    /// Balance timer, if started
    pub fn balance_timer(&self) -> Option<&BalanceTimer> {
        self.balance_timer.as_ref()
    }

    /// Tick notification. Runs a sweep and re-arms when the timer is due.
    ///
    /// Returns the number of processes promoted, or `None` when no sweep ran.
    pub fn on_tick(&mut self, now: u64) -> Option<usize> {
        if !self.balance_timer.is_some_and(|t| t.is_due(now)) {
            return None;
        }

        let promoted = self.balance_queues();
        if let Some(timer) = self.balance_timer.as_mut() {
            timer.rearm(now);
        }
        Some(promoted)
    }

    /// Promote every demoted process outside the user band by one queue.
    ///
    /// Dispatch failures are logged and counted, a CPU that rejects a
    /// promoted process is marked dead, and the sweep moves on.
    pub fn balance_queues(&mut self) -> usize {
        let eligible: Vec<_> = self.registry.iter()
            .filter(|(_, r)| r.priority.level() > r.max_priority && !r.priority.in_user_band())
            .map(|(id, _)| id)
            .collect();

        for &id in &eligible {
            if let Ok(record) = self.registry.get_mut(id) {
                record.priority = record.priority.raised();
                log::debug!("promoted endpoint {} to queue {}", record.endpoint, record.priority.level());
            }
            self.metrics.record_promotion();
            if let Err(err) = self.apply(id, ChangeSet::LOCAL) {
                self.note_dispatch_failure(id, err);
            }
        }

        eligible.len()
    }
}
