//! # Quantum Expiry
//!
//! A process that used up its whole quantum is treated as CPU-bound. Inside
//! the user band it simply returns to resting; outside the band it sinks one
//! queue, never past [`DEMOTION_FLOOR`]. Either way a lottery round follows.

use crate::dispatch::{ChangeSet, Kernel};
use crate::priority::{Priority, DEMOTION_FLOOR};
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use crate::{Endpoint, SchedResult};

/// Priority after a quantum expiry
pub fn after_quantum(priority: Priority) -> Priority {
    if priority.in_user_band() {
        Priority::Resting
    } else if priority.level() < DEMOTION_FLOOR {
        priority.lowered()
    } else {
        priority
    }
}

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Handle an out-of-quantum notification for `endpoint`
    pub fn on_quantum_exhausted(&mut self, endpoint: Endpoint) -> SchedResult<()> {
        let id = self.registry.resolve(endpoint)?;
        let record = self.registry.get_mut(id)?;

        record.cputime += u64::from(record.time_slice);
        let before = record.priority;
        record.priority = after_quantum(before);

        log::debug!(
            "endpoint {} out of quantum: cputime {}, tickets {}, queue {} -> {}",
            endpoint,
            record.cputime,
            record.tickets,
            before.level(),
            record.priority.level()
        );
        self.metrics.record_quantum_expiry();
        if !before.in_user_band() && record.priority.level() > before.level() {
            self.metrics.record_demotion();
        }

        self.apply(id, ChangeSet::LOCAL)?;
        self.run_lottery()
    }
}
