//! # Lottery Server Configuration

use crate::message::Context;
use alloc::vec;
use alloc::vec::Vec;
use lotsched_policy::{Endpoint, PolicyConfig};

/// Configuration for the lottery scheduling server
#[derive(Debug, Clone)]
pub struct LotteryConfig {
    /// Policy engine settings
    pub policy: PolicyConfig,
    /// This server's own endpoint, written back on start requests
    pub self_endpoint: Endpoint,
    /// Senders allowed to start, stop and nice processes
    pub trusted: Vec<Endpoint>,
    /// Fixed draw seed; derived from the start tick when unset
    pub seed: Option<u64>,
}

impl LotteryConfig {
    /// Process manager endpoint
    pub const PROCESS_MANAGER: Endpoint = Endpoint::from_raw(0);
    /// Scheduler endpoint
    pub const SCHEDULER: Endpoint = Endpoint::from_raw(4);

    /// Create default configuration
    pub fn new() -> Self {
        Self {
            policy: PolicyConfig::new(),
            self_endpoint: Self::SCHEDULER,
            trusted: vec![Self::PROCESS_MANAGER, PolicyConfig::SYSTEM_SPAWNER],
            seed: None,
        }
    }

    /// Apply overrides from the module context
    pub fn apply_context(&mut self, ctx: &Context<'_>) {
        if let Some(cpus) = ctx.config_usize("cpu_count") {
            self.policy.cpu_count = cpus.clamp(1, PolicyConfig::MAX_CPUS);
        }
        if let Some(boot) = ctx.config_usize("boot_cpu") {
            self.policy.boot_cpu = boot;
        }
        if let Some(max_procs) = ctx.config_usize("max_procs") {
            self.policy.max_procs = max_procs;
        }
        if let Some(slice) = ctx.config_usize("time_slice_ticks") {
            self.policy.default_user_slice = u32::try_from(slice).unwrap_or(u32::MAX);
        }
        if let Some(secs) = ctx.config_usize("balance_secs") {
            self.policy.balance_interval_secs = u32::try_from(secs).unwrap_or(u32::MAX);
        }
        if let Some(spawner) = ctx.config("spawner").and_then(|s| s.trim().parse().ok()) {
            self.policy.system_spawner = Endpoint::from_raw(spawner);
        }
        if let Some(trusted) = ctx.config_endpoints("trusted") {
            self.trusted = trusted;
        }
        if let Some(seed) = ctx.config_u64("seed") {
            self.seed = Some(seed);
        }
    }

    /// Whether `sender` may send privileged requests
    pub fn is_trusted(&self, sender: Endpoint) -> bool {
        self.trusted.contains(&sender)
    }
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self::new()
    }
}
