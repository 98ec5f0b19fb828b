//! # Policy Configuration

use crate::{CpuId, Endpoint};

/// Configuration for the lottery policy engine
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Number of CPUs the dispatch kernel reports
    pub cpu_count: usize,
    /// Bootstrap processor, reserved for system processes
    pub boot_cpu: CpuId,
    /// Capacity of the process table
    pub max_procs: usize,
    /// Quantum given to the root process (in kernel ticks)
    pub default_user_slice: u32,
    /// Tickets a freshly registered process holds
    pub initial_tickets: u32,
    /// Floor for the ticket count
    pub min_tickets: u32,
    /// Seconds between anti-starvation sweeps
    pub balance_interval_secs: u32,
    /// Process whose children are treated as system processes
    pub system_spawner: Endpoint,
}

impl PolicyConfig {
    /// Default process table size
    pub const DEFAULT_MAX_PROCS: usize = 256;
    /// Default user quantum: 200 ticks
    pub const DEFAULT_USER_SLICE: u32 = 200;
    /// Starting and minimum ticket count
    pub const DEFAULT_TICKETS: u32 = 5;
    /// Sweep every 5 seconds
    pub const DEFAULT_BALANCE_SECS: u32 = 5;
    /// Upper bound on supported CPUs
    pub const MAX_CPUS: usize = crate::cpu::MAX_CPUS;
    /// Well-known endpoint of the system process spawner
    pub const SYSTEM_SPAWNER: Endpoint = Endpoint::from_raw(2);

    /// Create default configuration
    pub fn new() -> Self {
        Self {
            cpu_count: 1,
            boot_cpu: 0,
            max_procs: Self::DEFAULT_MAX_PROCS,
            default_user_slice: Self::DEFAULT_USER_SLICE,
            initial_tickets: Self::DEFAULT_TICKETS,
            min_tickets: Self::DEFAULT_TICKETS,
            balance_interval_secs: Self::DEFAULT_BALANCE_SECS,
            system_spawner: Self::SYSTEM_SPAWNER,
        }
    }

    /// Single CPU machine
    pub fn uniprocessor() -> Self {
        Self::new()
    }

    /// Symmetric multiprocessor with `cpu_count` CPUs booted from `boot_cpu`
    pub fn smp(cpu_count: usize, boot_cpu: CpuId) -> Self {
        Self {
            cpu_count: cpu_count.clamp(1, Self::MAX_CPUS),
            boot_cpu,
            ..Self::new()
        }
    }

    /// Set the process table size
    pub fn with_max_procs(mut self, max_procs: usize) -> Self {
        self.max_procs = max_procs;
        self
    }

    /// Whether CPU placement has any choice to make
    pub fn is_smp(&self) -> bool {
        self.cpu_count > 1
    }

    /// Raise the ticket settings to the floor every process keeps
    pub fn validated(mut self) -> Self {
        self.min_tickets = self.min_tickets.max(Self::DEFAULT_TICKETS);
        self.initial_tickets = self.initial_tickets.max(self.min_tickets);
        self
    }

    /// Balance interval converted to kernel ticks
    pub fn balance_interval_ticks(&self, tick_hz: u32) -> u64 {
        u64::from(self.balance_interval_secs) * u64::from(tick_hz)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::new()
    }
}
