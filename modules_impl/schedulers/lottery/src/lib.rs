//! # Lottery Scheduler Module
//!
//! The user-space scheduling server built on the lottery policy engine.
//!
//! ## Features
//! - Start, inherit, stop and nice requests from trusted senders
//! - Out-of-quantum notifications from the kernel
//! - Periodic queue balancing driven by tick events
//! - CPU hotplug: an offline CPU is never placed on again
//!
//! ## Usage
//!
//! The host constructs the module with its kernel binding, calls `init`
//! with a configuration context and `start` with the current tick, then
//! feeds it messages and events. All handlers run under one lock, one at a
//! time.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

mod config;
mod message;

pub use config::LotteryConfig;
pub use message::{
    Context, Event, EventResponse, Message, MessageKind, Reply, Request, Response, Status,
};

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use lotsched_policy::metrics::MetricsSnapshot;
use lotsched_policy::{CpuLoad, Kernel, SchedError, SchedulerState, StartMode, XorShiftSource};
use spin::Mutex;

/// Scheduler state as shared by the module
pub type SharedScheduler<K> = Arc<Mutex<SchedulerState<K, XorShiftSource>>>;

/// Module lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleError {
    /// `init` was called twice
    AlreadyInitialized,
    /// Operation needs `init` first
    NotInitialized,
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::AlreadyInitialized => write!(f, "module already initialized"),
            ModuleError::NotInitialized => write!(f, "module not initialized"),
        }
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Policy counters
    pub metrics: MetricsSnapshot,
    /// Live scheduled processes
    pub processes: usize,
    /// Per-CPU charged process count, `None` for dead CPUs
    pub cpu_load: Vec<Option<u32>>,
}

impl SchedulerStats {
    /// Serialize as a flat JSON object; dead CPUs load as `null`
    pub fn to_json(&self) -> String {
        let m = &self.metrics;
        let loads: Vec<String> = self.cpu_load
            .iter()
            .map(|load| match load {
                Some(n) => format!("{}", n),
                None => String::from("null"),
            })
            .collect();

        format!(
            "{{\"processes\":{},\"registrations\":{},\"deregistrations\":{},\
             \"quantum_expiries\":{},\"demotions\":{},\"promotions\":{},\
             \"lottery_rounds\":{},\"lottery_wins\":{},\"dispatch_failures\":{},\
             \"rollbacks\":{},\"dead_cpus\":{},\"cpu_load\":[{}]}}",
            self.processes,
            m.registrations,
            m.deregistrations,
            m.quantum_expiries,
            m.demotions,
            m.promotions,
            m.lottery_rounds,
            m.lottery_wins,
            m.dispatch_failures,
            m.rollbacks,
            m.dead_cpus,
            loads.join(",")
        )
    }
}

// =============================================================================
// Module Definition
// =============================================================================

/// Lottery scheduler module
pub struct LotteryModule<K: Kernel> {
    /// The scheduler state, once initialized
    scheduler: Option<SharedScheduler<K>>,
    /// Kernel binding, moved into the state on init
    kernel: Option<K>,
    /// Configuration
    config: LotteryConfig,
    /// Draw source seeded, either from the configuration or on first start
    seeded: bool,
}

impl<K: Kernel> LotteryModule<K> {
    /// Module name
    pub const NAME: &'static str = "scheduler.lottery";

    /// Create a new module instance with default configuration
    pub fn new(kernel: K) -> Self {
        Self::with_config(kernel, LotteryConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(kernel: K, config: LotteryConfig) -> Self {
        Self {
            scheduler: None,
            kernel: Some(kernel),
            config,
            seeded: false,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    /// Shared scheduler state, once initialized
    pub fn scheduler(&self) -> Option<SharedScheduler<K>> {
        self.scheduler.clone()
    }

    /// Build the scheduler state from the configuration context
    pub fn init(&mut self, ctx: &Context<'_>) -> Result<(), ModuleError> {
        log::info!("[lottery] Initializing scheduler module");

        let kernel = self.kernel.take().ok_or(ModuleError::AlreadyInitialized)?;
        self.config.apply_context(ctx);

        let mut state = SchedulerState::new(self.config.policy.clone(), kernel, XorShiftSource::default());
        if let Some(seed) = self.config.seed {
            state.reseed(seed);
            self.seeded = true;
        }
        self.scheduler = Some(Arc::new(Mutex::new(state)));

        log::info!(
            "[lottery] Initialized for {} CPUs, user quantum {} ticks, balance every {}s",
            self.config.policy.cpu_count,
            self.config.policy.default_user_slice,
            self.config.policy.balance_interval_secs
        );
        Ok(())
    }

    /// Arm the balance timer. The first start also seeds the draw source
    /// from `now` unless a seed was configured.
    pub fn start(&mut self, now: u64) -> Result<(), ModuleError> {
        let scheduler = self.scheduler.as_ref().ok_or(ModuleError::NotInitialized)?;
        let mut state = scheduler.lock();

        if !self.seeded {
            state.reseed(now ^ 0x5DEE_CE66_D1CE_4E5B);
            self.seeded = true;
        }
        state.start_balancing(now);

        log::info!("[lottery] Scheduler started at tick {}", now);
        Ok(())
    }

    /// Cancel the balance timer
    pub fn stop(&mut self) -> Result<(), ModuleError> {
        log::info!("[lottery] Stopping scheduler");
        let scheduler = self.scheduler.as_ref().ok_or(ModuleError::NotInitialized)?;
        scheduler.lock().stop_balancing();
        Ok(())
    }

    /// Handle one scheduling request
    pub fn handle_message(&mut self, message: &Message) -> Reply {
        let Some(scheduler) = self.scheduler.as_ref() else {
            return Reply::status(Status::Invalid);
        };

        if message.needs_authorization() && !self.config.is_trusted(message.source) {
            log::warn!("[lottery] Request from untrusted endpoint {} refused", message.source);
            return Reply::status(Status::PermissionDenied);
        }

        let mut state = scheduler.lock();
        match message.kind {
            MessageKind::Start { endpoint, parent, max_priority, quantum } => {
                let result = state.register(endpoint, parent, max_priority, StartMode::Explicit { quantum });
                self.start_reply(result.map(|_| ()))
            }
            MessageKind::Inherit { endpoint, parent, max_priority } => {
                let result = state.register(endpoint, parent, max_priority, StartMode::Inherit);
                self.start_reply(result.map(|_| ()))
            }
            MessageKind::Stop { endpoint } => Reply::status(state.deregister(endpoint).into()),
            MessageKind::Nice { endpoint, delta } => Reply::status(state.set_nice(endpoint, delta).into()),
            MessageKind::NoQuantum => {
                let result = state.on_quantum_exhausted(message.source);
                if result.is_err() {
                    log::warn!("[lottery] Out-of-quantum from {} failed: {:?}", message.source, result);
                }
                Reply::status(result.into())
            }
        }
    }

    fn start_reply(&self, result: Result<(), SchedError>) -> Reply {
        match result {
            Ok(()) => Reply {
                status: Status::Ok,
                scheduler: Some(self.config.self_endpoint),
            },
            Err(err) => {
                if err == SchedError::NoUsableCpu {
                    log::error!("[lottery] No usable CPU left, process cannot run");
                }
                Reply::status(err.into())
            }
        }
    }

    /// Handle a system event
    pub fn handle_event(&mut self, event: &Event) -> EventResponse {
        let Some(scheduler) = self.scheduler.as_ref() else {
            return EventResponse::Ignored;
        };

        match event {
            Event::Tick { now } => {
                if let Some(promoted) = scheduler.lock().on_tick(*now) {
                    log::debug!("[lottery] Balance sweep at tick {} promoted {}", now, promoted);
                }
                EventResponse::Handled
            }
            Event::CpuHotplug { cpu_id, online } => {
                if *online {
                    log::info!("[lottery] CPU {} online, placement unchanged", cpu_id);
                    return EventResponse::Ignored;
                }
                log::info!("[lottery] CPU {} going offline", cpu_id);
                scheduler.lock().mark_cpu_dead(*cpu_id);
                EventResponse::Handled
            }
            Event::Shutdown => {
                log::info!("[lottery] Received shutdown event");
                scheduler.lock().stop_balancing();
                EventResponse::Handled
            }
        }
    }

    /// Handle an admin request
    pub fn handle_request(&mut self, request: &Request) -> Response {
        match request.request_type.as_str() {
            "get_stats" => match self.stats() {
                Some(stats) => Response::ok(stats.to_json().into_bytes()),
                None => Response::err("Scheduler not initialized"),
            },
            _ => Response::err("Unknown request type"),
        }
    }

    /// Snapshot of the scheduler's counters and load
    pub fn stats(&self) -> Option<SchedulerStats> {
        let state = self.scheduler.as_ref()?.lock();
        Some(SchedulerStats {
            metrics: state.metrics().snapshot(),
            processes: state.registry().len(),
            cpu_load: state.cpus()
                .loads()
                .iter()
                .map(|load| match load {
                    CpuLoad::Available(n) => Some(*n),
                    CpuLoad::Dead => None,
                })
                .collect(),
        })
    }

    /// Whether the module has been initialized
    pub fn is_healthy(&self) -> bool {
        self.scheduler.is_some()
    }
}

impl<K: Kernel> fmt::Debug for LotteryModule<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotteryModule")
            .field("initialized", &self.scheduler.is_some())
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Module Entry Point
// =============================================================================

/// Create a new instance of this module
pub fn create_module<K: Kernel>(kernel: K) -> LotteryModule<K> {
    LotteryModule::new(kernel)
}

/// Create module with custom config
pub fn create_module_with_config<K: Kernel>(kernel: K, config: LotteryConfig) -> LotteryModule<K> {
    LotteryModule::with_config(kernel, config)
}

#[cfg(test)]
mod module_tests;
