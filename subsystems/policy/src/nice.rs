//! # Ticket Adjustment
//!
//! A nice request changes a process's share of the lottery rather than its
//! queue: the delta is added to its tickets and the process goes back to
//! resting priority.

use crate::dispatch::{ChangeSet, Kernel};
use crate::priority::{Priority, USER_Q};
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use crate::{Endpoint, SchedError, SchedResult};

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Add `delta` tickets to `endpoint`, floored at the configured minimum.
    ///
    /// If the kernel refuses the re-dispatch, priority, ceiling and tickets
    /// are restored. A lottery round runs either way and its result is
    /// returned.
    pub fn set_nice(&mut self, endpoint: Endpoint, delta: i32) -> SchedResult<()> {
        let id = self.registry.resolve(endpoint)?;
        let resting = Priority::from_level(USER_Q).ok_or(SchedError::InvalidPriority)?;
        let min_tickets = self.config.min_tickets;

        let record = self.registry.get_mut(id)?;
        let saved = (record.priority, record.max_priority, record.tickets);

        let tickets = i64::from(record.tickets) + i64::from(delta);
        record.tickets = tickets.clamp(i64::from(min_tickets), i64::from(u32::MAX)) as u32;
        record.priority = resting;

        if self.apply(id, ChangeSet::LOCAL).is_err() {
            let record = self.registry.get_mut(id)?;
            (record.priority, record.max_priority, record.tickets) = saved;
            self.metrics.record_rollback();
            log::warn!("nice on endpoint {} rolled back", endpoint);
        }

        self.run_lottery()
    }
}
