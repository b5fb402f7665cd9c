//! SkillExecutor scheduling, failure and cancellation behaviour.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use robovox_core::error::{FailureClass, HardwareError};
use robovox_core::event::{DomainEvent, EventBus};
use robovox_core::plan::{ExecutionStatus, Plan};
use robovox_core::skill::{
    CapabilitySchema, ConcurrencyClass, SkillCall, SkillFailure, SkillHost, SkillResult,
    SkillSpec, SkillStatus,
};
use robovox_executor::SkillExecutor;
use robovox_robot::{RobotTools, SimulatedArm, SkillKind, WorkspaceLimits};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Span {
    call_id: String,
    start: Instant,
    end: Instant,
}

/// A host whose skills sleep for a fixed time and optionally fail.
struct ScriptedHost {
    schema: CapabilitySchema,
    script: HashMap<&'static str, (Duration, Option<FailureClass>)>,
    spans: Mutex<Vec<Span>>,
}

impl ScriptedHost {
    fn new() -> Self {
        let entries: [(&'static str, ConcurrencyClass, u64, Option<FailureClass>); 6] = [
            ("slow_p", ConcurrencyClass::ParallelSafe, 100, None),
            ("fast_p", ConcurrencyClass::ParallelSafe, 20, None),
            ("fail_p", ConcurrencyClass::ParallelSafe, 30, Some(FailureClass::Transient)),
            ("fatal_p", ConcurrencyClass::ParallelSafe, 30, Some(FailureClass::Fatal)),
            ("excl", ConcurrencyClass::Exclusive, 50, None),
            ("fail_e", ConcurrencyClass::Exclusive, 50, Some(FailureClass::Rejected)),
        ];
        let mut schema = CapabilitySchema::new();
        let mut script = HashMap::new();
        for (name, class, ms, failure) in entries {
            schema.register(SkillSpec {
                name: name.into(),
                description: name.into(),
                args: vec![],
                concurrency: class,
                interfaces: vec![],
                actuators: vec![],
            });
            script.insert(name, (Duration::from_millis(ms), failure));
        }
        Self {
            schema,
            script,
            spans: Mutex::new(Vec::new()),
        }
    }

    fn call(&self, name: &str) -> SkillCall {
        let class = self.schema.get(name).unwrap().concurrency;
        SkillCall::new(name, serde_json::Map::new(), class)
    }

    fn span(&self, call: &SkillCall) -> Span {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.call_id == call.id())
            .cloned()
            .unwrap()
    }

    fn ran(&self) -> usize {
        self.spans.lock().unwrap().len()
    }
}

#[async_trait]
impl SkillHost for ScriptedHost {
    fn schema(&self) -> &CapabilitySchema {
        &self.schema
    }

    async fn invoke(&self, call: &SkillCall) -> SkillResult {
        let (delay, failure) = self.script[call.name()];
        let start = Instant::now();
        tokio::time::sleep(delay).await;
        self.spans.lock().unwrap().push(Span {
            call_id: call.id().to_string(),
            start,
            end: Instant::now(),
        });
        match failure {
            None => SkillResult::ok(call, None).with_attempts(1),
            Some(class) => SkillResult::failed(
                call,
                SkillFailure {
                    class,
                    message: "scripted".into(),
                },
            )
            .with_attempts(1),
        }
    }
}

fn robot(arm: Arc<SimulatedArm>) -> Arc<RobotTools> {
    Arc::new(
        RobotTools::new(arm.clone(), arm.clone(), arm, Arc::new(WorkspaceLimits::default()))
            .with_transient_retry(1, Duration::from_millis(250)),
    )
}

fn skill(name: &str, args: serde_json::Value) -> SkillCall {
    let kind = SkillKind::from_name(name).unwrap();
    SkillCall::new(name, args.as_object().cloned().unwrap_or_default(), kind.concurrency())
}

#[tokio::test(start_paused = true)]
async fn exclusive_call_is_a_barrier() {
    let host = Arc::new(ScriptedHost::new());
    let calls = vec![
        host.call("slow_p"),
        host.call("fast_p"),
        host.call("excl"),
        host.call("fast_p"),
        host.call("slow_p"),
    ];
    let plan = Plan::new(calls.clone());

    let result = SkillExecutor::new(host.clone())
        .execute(&plan, &CancellationToken::new())
        .await;
    assert_eq!(result.status, ExecutionStatus::Ok);

    let spans: Vec<Span> = calls.iter().map(|c| host.span(c)).collect();
    // The two leading parallel calls overlapped.
    assert!(spans[0].start < spans[1].end && spans[1].start < spans[0].end);
    // Nothing before the exclusive call was still running when it started.
    assert!(spans[0].end <= spans[2].start && spans[1].end <= spans[2].start);
    // Nothing after it started before it completed.
    assert!(spans[3].start >= spans[2].end && spans[4].start >= spans[2].end);
}

#[tokio::test(start_paused = true)]
async fn batch_results_follow_completion_order() {
    let host = Arc::new(ScriptedHost::new());
    let slow = host.call("slow_p");
    let fast = host.call("fast_p");
    let plan = Plan::new(vec![slow.clone(), fast.clone()]);

    let result = SkillExecutor::new(host)
        .execute(&plan, &CancellationToken::new())
        .await;
    let order: Vec<&str> = result.results.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(order, vec![fast.id(), slow.id()]);
}

#[tokio::test(start_paused = true)]
async fn parallel_failure_leaves_the_run_going() {
    let host = Arc::new(ScriptedHost::new());
    let plan = Plan::new(vec![
        host.call("fail_p"),
        host.call("fast_p"),
        host.call("excl"),
    ]);

    let result = SkillExecutor::new(host.clone())
        .execute(&plan, &CancellationToken::new())
        .await;
    assert_eq!(result.status, ExecutionStatus::Partial);
    assert_eq!(result.count(SkillStatus::Ok), 2);
    assert_eq!(result.count(SkillStatus::Failed), 1);
    assert!(!result.fatal);
    assert_eq!(host.ran(), 3);
}

#[tokio::test(start_paused = true)]
async fn exclusive_failure_aborts_the_rest() {
    let host = Arc::new(ScriptedHost::new());
    let calls = vec![host.call("fast_p"), host.call("fail_e"), host.call("excl"), host.call("slow_p")];
    let plan = Plan::new(calls.clone());

    let result = SkillExecutor::new(host.clone())
        .execute(&plan, &CancellationToken::new())
        .await;
    assert_eq!(result.status, ExecutionStatus::Aborted);
    assert!(!result.fatal);
    assert_eq!(result.results.len(), 4);
    assert_eq!(result.result_for(calls[2].id()).unwrap().status, SkillStatus::Skipped);
    assert_eq!(result.result_for(calls[3].id()).unwrap().status, SkillStatus::Skipped);
    assert_eq!(host.ran(), 2);
}

#[tokio::test(start_paused = true)]
async fn fatal_parallel_failure_lets_the_batch_settle_then_aborts() {
    let host = Arc::new(ScriptedHost::new());
    let calls = vec![host.call("fatal_p"), host.call("slow_p"), host.call("excl")];
    let plan = Plan::new(calls.clone());

    let result = SkillExecutor::new(host.clone())
        .execute(&plan, &CancellationToken::new())
        .await;
    assert_eq!(result.status, ExecutionStatus::Aborted);
    assert!(result.fatal);
    // The sibling in the same batch still completed.
    assert_eq!(result.result_for(calls[1].id()).unwrap().status, SkillStatus::Ok);
    assert_eq!(result.result_for(calls[2].id()).unwrap().status, SkillStatus::Skipped);
}

#[tokio::test(start_paused = true)]
async fn stale_call_is_rejected_before_the_host_sees_it() {
    let host = Arc::new(ScriptedHost::new());
    // Declared parallel-safe, registered exclusive.
    let stale = SkillCall::new("excl", serde_json::Map::new(), ConcurrencyClass::ParallelSafe);
    let unknown = SkillCall::new("warp", serde_json::Map::new(), ConcurrencyClass::Exclusive);
    let plan = Plan::new(vec![stale.clone(), unknown.clone(), host.call("excl")]);

    let result = SkillExecutor::new(host.clone())
        .execute(&plan, &CancellationToken::new())
        .await;

    let stale_result = result.result_for(stale.id()).unwrap();
    assert_eq!(stale_result.attempts, 0);
    assert_eq!(stale_result.error.as_ref().unwrap().class, FailureClass::Rejected);
    assert_eq!(result.status, ExecutionStatus::Aborted);
    assert_eq!(host.ran(), 0);
}

#[tokio::test]
async fn empty_plan_is_ok() {
    let result = SkillExecutor::new(Arc::new(ScriptedHost::new()))
        .execute(&Plan::new(vec![]), &CancellationToken::new())
        .await;
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert!(result.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn aggregate_status_law_holds() {
    let host = Arc::new(ScriptedHost::new());
    let cases: Vec<(Vec<&str>, ExecutionStatus)> = vec![
        (vec!["fast_p", "excl", "slow_p"], ExecutionStatus::Ok),
        (vec!["fail_p", "slow_p"], ExecutionStatus::Partial),
        (vec!["excl", "fail_p", "excl"], ExecutionStatus::Partial),
        (vec!["excl", "fail_e", "fast_p"], ExecutionStatus::Aborted),
        (vec!["fail_e", "excl"], ExecutionStatus::Aborted),
        // Nothing left to abort: a failing last call is just a failure.
        (vec!["fail_e"], ExecutionStatus::Partial),
        (vec!["excl", "fail_e"], ExecutionStatus::Partial),
        (vec!["fatal_p"], ExecutionStatus::Aborted),
    ];
    let executor = SkillExecutor::new(host.clone());

    for (names, expected) in cases {
        let plan = Plan::new(names.iter().map(|n| host.call(n)).collect());
        let result = executor.execute(&plan, &CancellationToken::new()).await;
        assert_eq!(result.status, expected, "plan {names:?}");
        assert_eq!(result.results.len(), plan.len());
        let all_ok = result.results.iter().all(|r| r.is_ok());
        assert_eq!(result.status == ExecutionStatus::Ok, all_ok);
    }
}

#[tokio::test(start_paused = true)]
async fn events_cover_every_call_and_the_plan() {
    let host = Arc::new(ScriptedHost::new());
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();
    let plan = Plan::new(vec![host.call("fail_e"), host.call("fast_p")]);

    SkillExecutor::new(host)
        .with_events(bus)
        .execute(&plan, &CancellationToken::new())
        .await;

    let mut statuses = Vec::new();
    let mut plan_status = None;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            DomainEvent::SkillExecuted { status, .. } => statuses.push(*status),
            DomainEvent::PlanExecuted { status, .. } => plan_status = Some(*status),
            _ => {}
        }
    }
    assert_eq!(statuses, vec![SkillStatus::Failed, SkillStatus::Skipped]);
    assert_eq!(plan_status, Some(ExecutionStatus::Aborted));
}

// Round trips against the simulated arm.

#[tokio::test(start_paused = true)]
async fn two_fingers_move_concurrently() {
    let arm = Arc::new(SimulatedArm::new(Duration::from_millis(200)));
    let plan = Plan::new(vec![
        skill("adjust_finger", json!({"finger": 1, "position": 0.9})),
        skill("adjust_finger", json!({"finger": 2, "position": 0.9})),
    ]);

    let started = Instant::now();
    let result = SkillExecutor::new(robot(arm.clone()))
        .execute(&plan, &CancellationToken::new())
        .await;

    assert_eq!(result.status, ExecutionStatus::Ok);
    let calls = arm.calls_of("set_finger");
    assert_eq!(calls.len(), 2);
    assert!(calls[0].overlaps(&calls[1]));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(arm.finger(1), Some(0.9));
    assert_eq!(arm.finger(2), Some(0.9));
}

#[tokio::test(start_paused = true)]
async fn fatal_on_second_of_three_exclusive_calls() {
    let arm = Arc::new(SimulatedArm::new(Duration::from_millis(200)));
    arm.fail_call(
        "command_cartesian_goal",
        2,
        HardwareError::Fatal("joint 2 overcurrent".into()),
    );
    let plan = Plan::new(vec![
        skill("move_to", json!({"direction": "forward"})),
        skill("move_to", json!({"direction": "up"})),
        skill("stop", json!({})),
    ]);

    let result = SkillExecutor::new(robot(arm.clone()))
        .execute(&plan, &CancellationToken::new())
        .await;

    let statuses: Vec<SkillStatus> = result.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![SkillStatus::Ok, SkillStatus::Failed, SkillStatus::Skipped]);
    assert!(result.results[1].is_fatal());
    assert_eq!(result.status, ExecutionStatus::Aborted);
    assert!(result.fatal);
    assert!(arm.calls_of("stop").is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_lets_the_inflight_call_finish() {
    let arm = Arc::new(SimulatedArm::new(Duration::from_millis(500)));
    let plan = Plan::new(vec![
        skill("move_to", json!({"direction": "forward"})),
        skill("move_to", json!({"direction": "left"})),
        skill("stop", json!({})),
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = SkillExecutor::new(robot(arm.clone())).execute(&plan, &cancel).await;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    let statuses: Vec<SkillStatus> = result.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![SkillStatus::Ok, SkillStatus::Skipped, SkillStatus::Skipped]);
    // The first move completed, the second was never commanded.
    assert_eq!(arm.calls_of("command_cartesian_goal").len(), 1);
    assert!(arm.calls_of("command_cartesian_goal")[0].ok);
}

#[tokio::test(start_paused = true)]
async fn cancellation_uses_the_abort_hook_when_available() {
    let arm = Arc::new(SimulatedArm::new(Duration::from_secs(5)).with_abort_support());
    let plan = Plan::new(vec![
        skill("move_to", json!({"direction": "forward"})),
        skill("stop", json!({})),
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = SkillExecutor::new(robot(arm.clone())).execute(&plan, &cancel).await;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.results[0].error.as_ref().unwrap().class, FailureClass::Rejected);
    assert_eq!(result.results[1].status, SkillStatus::Skipped);
    assert_eq!(arm.joints(), vec![0.0; 6]);
}
