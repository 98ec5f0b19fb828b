//! # Process Lifecycle
//!
//! Start and stop scheduling a process.
//!
//! Registration builds the record, makes sure the registry can take it,
//! takes the process over from the kernel, commits it and then places and
//! dispatches it. A CPU that rejects the dispatch is marked dead and
//! placement retries on the rest.

use crate::dispatch::{ChangeSet, DispatchError, Kernel};
use crate::priority::{Priority, QUEUE_COUNT};
use crate::registry::{ScheduledProcess, SlotId};
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use crate::{Endpoint, SchedError, SchedResult};

/// How a new process gets its priority and quantum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Priority is the requested ceiling, quantum is given directly
    Explicit {
        /// Quantum in ticks
        quantum: u32,
    },
    /// Resting priority, quantum copied from the parent
    Inherit,
}

/// Progress of the place-and-dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Placing { attempt: usize },
    Done,
}

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Start scheduling `endpoint`.
    ///
    /// On success the process is live, placed and known to the kernel. The
    /// record is committed before the first dispatch, so a dispatch failure
    /// other than a bad CPU leaves it registered but possibly not runnable.
    pub fn register(
        &mut self,
        endpoint: Endpoint,
        parent: Endpoint,
        requested_ceiling: u32,
        mode: StartMode,
    ) -> SchedResult<SlotId> {
        let max_priority = u8::try_from(requested_ceiling)
            .ok()
            .filter(|&p| p < QUEUE_COUNT)
            .ok_or(SchedError::InvalidPriority)?;

        let mut record = ScheduledProcess::new(endpoint, parent, max_priority, self.config.initial_tickets);

        if record.is_root() {
            record.priority = Priority::Resting;
            record.time_slice = self.config.default_user_slice;
            record.cpu = self.cpus.boot_cpu();
        }

        match mode {
            StartMode::Explicit { quantum } => {
                record.priority = Priority::from_level(max_priority).ok_or(SchedError::InvalidPriority)?;
                record.time_slice = quantum;
            }
            StartMode::Inherit if record.is_root() => {}
            StartMode::Inherit => {
                let parent_slice = self.process(parent)?.time_slice;
                record.priority = Priority::Resting;
                record.time_slice = parent_slice;
            }
        }

        self.registry.check_vacancy(endpoint)?;
        if let Err(code) = self.kernel.take_over(endpoint) {
            log::warn!("kernel refused takeover of endpoint {}: {}", endpoint, code);
            return Err(SchedError::TakeoverFailed(code));
        }

        let id = self.registry.insert(record)?;
        self.metrics.record_registration();

        self.admit(id)?;

        log::debug!(
            "registered endpoint {} (parent {}, queue {}, ceiling {}, quantum {})",
            endpoint,
            parent,
            self.registry.get(id)?.priority.level(),
            max_priority,
            self.registry.get(id)?.time_slice
        );
        Ok(id)
    }

    /// Place and dispatch a freshly committed record, retiring CPUs that
    /// reject it. Bounded by the CPU count.
    fn admit(&mut self, id: SlotId) -> SchedResult<()> {
        let mut state = Admission::Placing { attempt: 0 };

        while let Admission::Placing { attempt } = state {
            if attempt > self.cpus.cpu_count() {
                return Err(SchedError::NoUsableCpu);
            }

            state = match self.apply(id, ChangeSet::ALL) {
                Ok(()) => Admission::Done,
                Err(SchedError::Dispatch(DispatchError::BadCpu)) => {
                    let cpu = self.registry.get(id)?.cpu;
                    self.mark_cpu_dead(cpu);
                    Admission::Placing { attempt: attempt + 1 }
                }
                Err(err) => {
                    log::warn!("error while scheduling slot {:?}: {}", id, err);
                    return Err(err);
                }
            };
        }

        Ok(())
    }

    /// Stop scheduling `endpoint`, free its slot and hold a lottery for the
    /// processes left behind.
    pub fn deregister(&mut self, endpoint: Endpoint) -> SchedResult<()> {
        let id = self.registry.resolve(endpoint)?;
        let mut record = self.registry.remove(id)?;
        self.cpus.release_record(&mut record);
        self.metrics.record_deregistration();

        log::debug!("deregistered endpoint {} (cputime {})", endpoint, record.cputime);

        self.run_lottery()
    }
}
