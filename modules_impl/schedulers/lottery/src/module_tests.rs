//! # Lottery Module Tests
//!
//! End-to-end tests driving the module through messages, events and admin
//! requests.

use super::*;
use alloc::string::String;
use alloc::vec;
use lotsched_policy::priority::{MAX_USER_Q, USER_Q};
use lotsched_policy::{CpuId, DispatchError, Endpoint, PolicyConfig, ScheduleRequest};

// =============================================================================
// Test Kernel
// =============================================================================

#[derive(Debug, Default)]
struct TestKernel {
    requests: Vec<ScheduleRequest>,
    bad_cpus: Vec<CpuId>,
}

impl Kernel for TestKernel {
    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), DispatchError> {
        self.requests.push(*request);
        match request.cpu {
            Some(cpu) if self.bad_cpus.contains(&cpu) => Err(DispatchError::BadCpu),
            _ => Ok(()),
        }
    }

    fn take_over(&mut self, _endpoint: Endpoint) -> Result<(), i32> {
        Ok(())
    }

    fn tick_rate(&self) -> u32 {
        60
    }
}

const PM: Endpoint = LotteryConfig::PROCESS_MANAGER;
const ROOT: Endpoint = Endpoint::from_raw(1);

fn init_with(kernel: TestKernel, cpu_count: &'static str) -> LotteryModule<TestKernel> {
    let mut module = create_module(kernel);
    let config_fn = |key: &str| -> Option<&str> {
        match key {
            "cpu_count" => Some(cpu_count),
            "seed" => Some("42"),
            _ => None,
        }
    };
    let ctx = Context::new(&config_fn);
    module.init(&ctx).expect("Init should succeed");
    module
}

fn module() -> LotteryModule<TestKernel> {
    init_with(TestKernel::default(), "1")
}

fn send(module: &mut LotteryModule<TestKernel>, source: Endpoint, kind: MessageKind) -> Reply {
    module.handle_message(&Message::new(source, kind))
}

fn start_root(module: &mut LotteryModule<TestKernel>) {
    let reply = send(
        module,
        PM,
        MessageKind::Start { endpoint: ROOT, parent: ROOT, max_priority: 0, quantum: 200 },
    );
    assert_eq!(reply.status, Status::Ok);
}

fn inherit(module: &mut LotteryModule<TestKernel>, endpoint: i32) -> Endpoint {
    let ep = Endpoint::from_raw(endpoint);
    let reply = send(
        module,
        PM,
        MessageKind::Inherit { endpoint: ep, parent: ROOT, max_priority: u32::from(USER_Q) },
    );
    assert_eq!(reply.status, Status::Ok);
    ep
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_messages_before_init_are_invalid() {
    let mut module = create_module(TestKernel::default());
    assert!(!module.is_healthy());

    let reply = send(&mut module, PM, MessageKind::Stop { endpoint: ROOT });
    assert_eq!(reply.status, Status::Invalid);
    assert_eq!(module.handle_event(&Event::Tick { now: 1 }), EventResponse::Ignored);
    assert!(module.stats().is_none());
    assert_eq!(module.start(0), Err(ModuleError::NotInitialized));
}

#[test]
fn test_init_twice_fails() {
    let mut module = module();
    assert!(module.is_healthy());

    let config_fn = |_: &str| -> Option<&str> { None };
    let ctx = Context::new(&config_fn);
    assert_eq!(module.init(&ctx), Err(ModuleError::AlreadyInitialized));
}

// =============================================================================
// Message Tests
// =============================================================================

#[test]
fn test_untrusted_sender_refused() {
    let mut module = module();
    let stranger = Endpoint::from_raw(99);

    let reply = send(
        &mut module,
        stranger,
        MessageKind::Start { endpoint: stranger, parent: stranger, max_priority: 0, quantum: 10 },
    );
    assert_eq!(reply.status, Status::PermissionDenied);
    assert_eq!(reply.status.code(), Status::EPERM);
    assert_eq!(reply.scheduler, None);
    assert_eq!(module.stats().unwrap().processes, 0);
}

#[test]
fn test_start_reply_names_scheduler() {
    let mut module = module();
    start_root(&mut module);

    let ep = Endpoint::from_raw(10);
    let reply = send(
        &mut module,
        PolicyConfig::SYSTEM_SPAWNER,
        MessageKind::Inherit { endpoint: ep, parent: ROOT, max_priority: u32::from(USER_Q) },
    );
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(reply.scheduler, Some(LotteryConfig::SCHEDULER));

    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    assert_eq!(state.registry().len(), 2);
    assert_eq!(state.process(ep).unwrap().time_slice, 200);
}

#[test]
fn test_start_with_bad_ceiling() {
    let mut module = module();
    let ep = Endpoint::from_raw(10);

    let reply = send(
        &mut module,
        PM,
        MessageKind::Start { endpoint: ep, parent: ROOT, max_priority: 99, quantum: 10 },
    );
    assert_eq!(reply.status, Status::Invalid);
    assert_eq!(reply.scheduler, None);
}

#[test]
fn test_duplicate_start_is_bad_endpoint() {
    let mut module = module();
    start_root(&mut module);

    let reply = send(
        &mut module,
        PM,
        MessageKind::Start { endpoint: ROOT, parent: ROOT, max_priority: 0, quantum: 200 },
    );
    assert_eq!(reply.status, Status::BadEndpoint);
}

#[test]
fn test_stop_unknown_endpoint() {
    let mut module = module();
    let reply = send(&mut module, PM, MessageKind::Stop { endpoint: Endpoint::from_raw(77) });
    assert_eq!(reply.status, Status::BadEndpoint);
    assert_eq!(reply.status.code(), Status::EBADEPT);
}

#[test]
fn test_stop_frees_slot() {
    let mut module = module();
    start_root(&mut module);
    let ep = inherit(&mut module, 10);

    let reply = send(&mut module, PM, MessageKind::Stop { endpoint: ep });
    assert!(reply.status.is_ok());

    let stats = module.stats().unwrap();
    assert_eq!(stats.processes, 1);
    assert_eq!(stats.metrics.deregistrations, 1);
}

#[test]
fn test_no_quantum_needs_no_trust() {
    let mut module = module();
    start_root(&mut module);
    let ep = inherit(&mut module, 10);

    let reply = send(&mut module, ep, MessageKind::NoQuantum);
    assert_eq!(reply.status, Status::Ok);

    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    let record = state.process(ep).unwrap();
    assert_eq!(record.cputime, 200);
    assert_eq!(state.metrics().snapshot().quantum_expiries, 1);
}

#[test]
fn test_no_quantum_from_unknown_source() {
    let mut module = module();
    let reply = send(&mut module, Endpoint::from_raw(55), MessageKind::NoQuantum);
    assert_eq!(reply.status, Status::BadEndpoint);
}

#[test]
fn test_nice_changes_tickets() {
    let mut module = module();
    start_root(&mut module);
    let ep = inherit(&mut module, 10);

    let reply = send(&mut module, PM, MessageKind::Nice { endpoint: ep, delta: 10 });
    assert_eq!(reply.status, Status::Ok);

    let reply = send(&mut module, PM, MessageKind::Nice { endpoint: Endpoint::from_raw(12), delta: 1 });
    assert_eq!(reply.status, Status::BadEndpoint);

    let scheduler = module.scheduler().unwrap();
    assert_eq!(scheduler.lock().process(ep).unwrap().tickets, 15);
}

// =============================================================================
// Event Tests
// =============================================================================

#[test]
fn test_tick_runs_balance_sweep() {
    let mut module = module();
    start_root(&mut module);

    let ep = Endpoint::from_raw(20);
    let reply = send(
        &mut module,
        PM,
        MessageKind::Start { endpoint: ep, parent: ROOT, max_priority: 10, quantum: 100 },
    );
    assert!(reply.status.is_ok());
    send(&mut module, ep, MessageKind::NoQuantum);
    {
        let scheduler = module.scheduler().unwrap();
        assert_eq!(scheduler.lock().process(ep).unwrap().priority.level(), 11);
    }

    module.start(0).unwrap();
    // 5 seconds at 60 ticks per second
    assert_eq!(module.handle_event(&Event::Tick { now: 299 }), EventResponse::Handled);
    {
        let scheduler = module.scheduler().unwrap();
        assert_eq!(scheduler.lock().process(ep).unwrap().priority.level(), 11);
    }

    assert_eq!(module.handle_event(&Event::Tick { now: 300 }), EventResponse::Handled);
    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    assert_eq!(state.process(ep).unwrap().priority.level(), 10);
    assert_eq!(state.metrics().snapshot().promotions, 1);
}

#[test]
fn test_shutdown_cancels_balancing() {
    let mut module = module();
    module.start(0).unwrap();
    assert!(module.scheduler().unwrap().lock().balance_timer().is_some_and(|t| t.is_armed()));

    assert_eq!(module.handle_event(&Event::Shutdown), EventResponse::Handled);
    assert!(!module.scheduler().unwrap().lock().balance_timer().is_some_and(|t| t.is_armed()));
}

#[test]
fn test_cpu_offline_marks_dead() {
    let mut module = init_with(TestKernel::default(), "4");

    let event = Event::CpuHotplug { cpu_id: 2, online: false };
    assert_eq!(module.handle_event(&event), EventResponse::Handled);

    let online = Event::CpuHotplug { cpu_id: 2, online: true };
    assert_eq!(module.handle_event(&online), EventResponse::Ignored);

    let stats = module.stats().unwrap();
    assert_eq!(stats.cpu_load.len(), 4);
    assert_eq!(stats.cpu_load[2], None);
    assert_eq!(stats.cpu_load[1], Some(0));
    assert_eq!(stats.metrics.dead_cpus, 1);
}

#[test]
fn test_rejected_cpu_falls_back_to_boot() {
    let kernel = TestKernel { bad_cpus: vec![1], ..TestKernel::default() };
    let mut module = init_with(kernel, "2");
    let ep = Endpoint::from_raw(30);

    let reply = send(
        &mut module,
        PM,
        MessageKind::Start { endpoint: ep, parent: Endpoint::from_raw(3), max_priority: MAX_USER_Q.into(), quantum: 50 },
    );
    assert_eq!(reply.status, Status::Ok);

    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    assert_eq!(state.process(ep).unwrap().cpu, 0);
    assert_eq!(state.cpus().load(1), Some(CpuLoad::Dead));
    let cpus: Vec<_> = state.kernel().requests.iter().map(|r| r.cpu).collect();
    assert_eq!(cpus, [Some(1), Some(0)]);
}

#[test]
fn test_boot_cpu_offline_moves_pinned_root() {
    let mut module = init_with(TestKernel::default(), "2");
    start_root(&mut module);

    let event = Event::CpuHotplug { cpu_id: 0, online: false };
    assert_eq!(module.handle_event(&event), EventResponse::Handled);

    let reply = send(&mut module, ROOT, MessageKind::NoQuantum);
    assert_eq!(reply.status, Status::Ok);

    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    assert_eq!(state.process(ROOT).unwrap().cpu, 1);
    assert_eq!(state.kernel().requests.last().map(|r| r.cpu), Some(Some(1)));
}

#[test]
fn test_start_seeds_draw_source_once() {
    let mut module = create_module(TestKernel::default());
    let config_fn = |_: &str| -> Option<&str> { None };
    let ctx = Context::new(&config_fn);
    module.init(&ctx).expect("Init should succeed");

    module.start(5).unwrap();
    let seeded = module.scheduler().unwrap().lock().draw_source().clone();

    module.start(9).unwrap();
    let scheduler = module.scheduler().unwrap();
    let state = scheduler.lock();
    assert_eq!(*state.draw_source(), seeded);
    assert!(state.balance_timer().is_some_and(|t| t.is_armed()));
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_get_stats_request() {
    let mut module = module();
    start_root(&mut module);
    let ep = inherit(&mut module, 10);
    send(&mut module, ep, MessageKind::NoQuantum);
    send(&mut module, PM, MessageKind::Stop { endpoint: ep });

    let response = module.handle_request(&Request::new("get_stats"));
    assert!(response.success);
    let payload = String::from_utf8(response.payload).unwrap();
    assert_eq!(payload, module.stats().unwrap().to_json());

    for field in [
        "\"processes\":1,",
        "\"registrations\":2,",
        "\"deregistrations\":1,",
        "\"quantum_expiries\":1,",
        "\"demotions\":",
        "\"promotions\":0,",
        "\"lottery_rounds\":",
        "\"lottery_wins\":",
        "\"dispatch_failures\":0,",
        "\"rollbacks\":0,",
        "\"dead_cpus\":0,",
        "\"cpu_load\":[0]}",
    ] {
        assert!(payload.contains(field), "missing {} in {}", field, payload);
    }

    let response = module.handle_request(&Request::new("reboot"));
    assert!(!response.success);
    assert!(response.error.is_some());
}

#[test]
fn test_stats_json_marks_dead_cpus_null() {
    let mut stats = SchedulerStats {
        processes: 3,
        cpu_load: vec![Some(2), None],
        ..SchedulerStats::default()
    };
    stats.metrics.lottery_rounds = 4;

    let json = stats.to_json();
    assert!(json.starts_with("{\"processes\":3,"));
    assert!(json.contains("\"lottery_rounds\":4,"));
    assert!(json.ends_with("\"cpu_load\":[2,null]}"));
}
