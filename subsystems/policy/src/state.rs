//! # Scheduler State
//!
//! Everything the policy engine mutates, owned by one value. Handlers take
//! `&mut self`, so requests are applied one at a time to completion.

use crate::balance::BalanceTimer;
use crate::config::PolicyConfig;
use crate::cpu::CpuLoadTable;
use crate::dispatch::{self, ChangeSet, DispatchError, Kernel};
use crate::metrics::PolicyMetrics;
use crate::registry::{ProcessRegistry, ScheduledProcess, SlotId};
use crate::rng::TicketSource;
use crate::{Endpoint, SchedError, SchedResult};

/// Scheduler state
#[derive(Debug)]
pub struct SchedulerState<K: Kernel, R: TicketSource> {
    pub(crate) config: PolicyConfig,
    pub(crate) registry: ProcessRegistry,
    pub(crate) cpus: CpuLoadTable,
    pub(crate) kernel: K,
    pub(crate) tickets: R,
    pub(crate) metrics: PolicyMetrics,
    pub(crate) balance_timer: Option<BalanceTimer>,
}

impl<K: Kernel, R: TicketSource> SchedulerState<K, R> {
    /// Create the state for a freshly started scheduler
    pub fn new(config: PolicyConfig, kernel: K, tickets: R) -> Self {
        let config = config.validated();
        log::info!(
            "Initializing lottery policy: {} CPU(s), boot CPU {}, {} slots",
            config.cpu_count,
            config.boot_cpu,
            config.max_procs
        );

        Self {
            registry: ProcessRegistry::with_capacity(config.max_procs),
            cpus: CpuLoadTable::new(config.cpu_count, config.boot_cpu),
            config,
            kernel,
            tickets,
            metrics: PolicyMetrics::new(),
            balance_timer: None,
        }
    }

    /// Policy configuration
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Process table
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// CPU load table
    pub fn cpus(&self) -> &CpuLoadTable {
        &self.cpus
    }

    /// Dispatch kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Dispatch kernel (mutable)
    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Reseed the lottery draw source
    pub fn reseed(&mut self, seed: u64) {
        self.tickets.reseed(seed);
    }

    /// Lottery draw source
    pub fn draw_source(&self) -> &R {
        &self.tickets
    }

    /// Policy counters
    pub fn metrics(&self) -> &PolicyMetrics {
        &self.metrics
    }

    /// Live record of an endpoint
    pub fn process(&self, endpoint: Endpoint) -> SchedResult<&ScheduledProcess> {
        let id = self.registry.resolve(endpoint)?;
        self.registry.get(id)
    }

    /// Mark a CPU dead, e.g. when the kernel reports it offline
    pub fn mark_cpu_dead(&mut self, cpu: usize) -> bool {
        let newly_dead = self.cpus.mark_dead(cpu);
        if newly_dead {
            self.metrics.record_dead_cpu();
        }
        newly_dead
    }

    /// Handle a failed request made on behalf of `id` by a caller that does
    /// not retry. Other errors were already logged by the dispatch adapter; a
    /// `BadCpu` retires the record's CPU.
    pub(crate) fn note_dispatch_failure(&mut self, id: SlotId, err: SchedError) {
        if err != SchedError::Dispatch(DispatchError::BadCpu) {
            return;
        }
        let Ok(record) = self.registry.get(id) else { return };
        let (endpoint, cpu) = (record.endpoint, record.cpu);

        log::warn!("CPU {} rejected endpoint {}", cpu, endpoint);
        self.mark_cpu_dead(cpu);
    }

    /// Send the fields in `changes` of the record at `id` to the kernel
    pub fn apply(&mut self, id: SlotId, changes: ChangeSet) -> SchedResult<()> {
        let record = self.registry.get_mut(id)?;
        let result = dispatch::schedule_process(
            record,
            &mut self.cpus,
            &mut self.kernel,
            self.config.system_spawner,
            changes,
        );
        if result.is_err() {
            self.metrics.record_dispatch_failure();
        }
        result
    }
}
