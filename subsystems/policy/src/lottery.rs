//! # Lottery Engine
//!
//! Every resting process in the user band holds tickets. One draw over the
//! total picks a winner, which is lifted to the most urgent user queue so
//! the strict-priority dispatcher runs it next. The winner drops back to
//! resting on its next quantum expiry, so each round benefits one process.

use crate::dispatch::{ChangeSet, Kernel};
use crate::priority::Priority;
use crate::registry::SlotId;
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use crate::SchedResult;
use alloc::vec::Vec;

/// Index of the winning entry for `draw` over `tickets`.
///
/// Walks the entries subtracting each ticket count from the draw; the first
/// entry that takes it below zero wins. `None` if the draw is not below the
/// ticket total.
pub fn pick_winner<I>(tickets: I, draw: u64) -> Option<usize>
where
    I: IntoIterator<Item = u32>,
{
    let mut remaining = i128::from(draw);
    for (index, count) in tickets.into_iter().enumerate() {
        remaining -= i128::from(count);
        if remaining < 0 {
            return Some(index);
        }
    }
    None
}

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Resting user-band processes, in registry order, with their tickets
    pub fn lottery_candidates(&self) -> Vec<(SlotId, u32)> {
        self.registry.iter()
            .filter(|(_, r)| r.priority.in_user_band() && r.priority.is_resting())
            .map(|(id, r)| (id, r.tickets))
            .collect()
    }

    /// Hold one lottery round among resting processes.
    ///
    /// With no tickets in play nothing changes. A winner whose dispatch is
    /// refused keeps its elevated priority; the failure is logged and counted
    /// (retiring the CPU on `BadCpu`) and the round still succeeds.
    pub fn run_lottery(&mut self) -> SchedResult<()> {
        let candidates = self.lottery_candidates();
        let total: u64 = candidates.iter().map(|&(_, t)| u64::from(t)).sum();

        if total == 0 {
            self.metrics.record_lottery(false);
            return Ok(());
        }

        let draw = self.tickets.random_uniform(total);
        let Some(index) = pick_winner(candidates.iter().map(|&(_, t)| t), draw) else {
            self.metrics.record_lottery(false);
            return Ok(());
        };
        let winner = candidates[index].0;

        let record = self.registry.get_mut(winner)?;
        record.priority = Priority::Elevated;
        log::debug!(
            "lottery: endpoint {} wins with {} of {} tickets (draw {})",
            record.endpoint,
            record.tickets,
            total,
            draw
        );
        self.metrics.record_lottery(true);

        if let Err(err) = self.apply(winner, ChangeSet::LOCAL) {
            self.note_dispatch_failure(winner, err);
        }
        Ok(())
    }
}
