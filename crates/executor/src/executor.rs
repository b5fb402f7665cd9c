//! The skill executor.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use robovox_core::event::{DomainEvent, EventBus};
use robovox_core::plan::{ExecutionResult, Plan};
use robovox_core::skill::{SkillCall, SkillFailure, SkillHost, SkillResult, SkillStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::partition;

/// Runs plans against a skill host.
pub struct SkillExecutor {
    host: Arc<dyn SkillHost>,
    events: Option<Arc<EventBus>>,
}

impl SkillExecutor {
    pub fn new(host: Arc<dyn SkillHost>) -> Self {
        Self { host, events: None }
    }

    /// Publish `SkillExecuted` / `PlanExecuted` events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn host(&self) -> &Arc<dyn SkillHost> {
        &self.host
    }

    /// Run `plan` to completion, abort or cancellation.
    ///
    /// - An exclusive call that fails with calls still to come stops the
    ///   run: status `aborted`. Failing as the last call leaves `partial`.
    /// - A fatal failure anywhere stops the run once its batch settles:
    ///   status `aborted` with `fatal` set.
    /// - A failed parallel-safe call leaves the run going: status `partial`.
    /// - Once `cancel` fires no further batch is dispatched. Calls already
    ///   in flight finish (the host's abort hook is used when it has one)
    ///   and the run reports `cancelled`.
    ///
    /// Every call gets exactly one result; calls that never ran are appended
    /// as `skipped` in plan order.
    pub async fn execute(&self, plan: &Plan, cancel: &CancellationToken) -> ExecutionResult {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(plan.len());
        let mut aborted = false;
        let mut fatal = false;
        let mut next = 0;

        info!(plan_id = %plan.id, calls = plan.len(), "Executing plan");

        for batch in partition(&plan.calls) {
            if cancel.is_cancelled() {
                info!(plan_id = %plan.id, remaining = plan.len() - next, "Plan cancelled, not dispatching further batches");
                break;
            }

            let calls = &plan.calls[batch.range.clone()];
            debug!(
                plan_id = %plan.id,
                first = batch.range.start,
                size = batch.len(),
                exclusive = batch.exclusive,
                "Dispatching batch"
            );
            let batch_results = self.run_batch(calls, cancel).await;
            next = batch.range.end;

            let failed = batch_results.iter().any(SkillResult::is_failed);
            let batch_fatal = batch_results.iter().any(SkillResult::is_fatal);
            results.extend(batch_results);

            if batch_fatal {
                error!(plan_id = %plan.id, "Fatal hardware failure, aborting plan");
                fatal = true;
                aborted = true;
                break;
            }
            if batch.exclusive && failed && next < plan.len() {
                warn!(plan_id = %plan.id, skill = %calls[0].name(), "Exclusive call failed, aborting plan");
                aborted = true;
                break;
            }
        }

        for call in &plan.calls[next..] {
            let skipped = SkillResult::skipped(call);
            self.publish_skill(&skipped);
            results.push(skipped);
        }

        let cancelled = cancel.is_cancelled();
        let status = ExecutionResult::aggregate(&results, aborted, cancelled);
        info!(
            plan_id = %plan.id,
            %status,
            ok = results.iter().filter(|r| r.status == SkillStatus::Ok).count(),
            failed = results.iter().filter(|r| r.is_failed()).count(),
            skipped = results.iter().filter(|r| r.status == SkillStatus::Skipped).count(),
            "Plan finished"
        );

        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::PlanExecuted {
                plan_id: plan.id.clone(),
                status,
                calls: plan.len(),
                timestamp: Utc::now(),
            });
        }

        ExecutionResult {
            plan_id: plan.id.clone(),
            status,
            results,
            fatal,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Run one batch, collecting results in completion order.
    async fn run_batch(&self, calls: &[SkillCall], cancel: &CancellationToken) -> Vec<SkillResult> {
        let mut pending: FuturesUnordered<_> = calls.iter().map(|call| self.run_call(call)).collect();
        let mut results = Vec::with_capacity(calls.len());
        let mut abort_requested = false;

        loop {
            tokio::select! {
                finished = pending.next() => match finished {
                    Some(result) => {
                        self.publish_skill(&result);
                        results.push(result);
                    }
                    None => break,
                },
                _ = cancel.cancelled(), if !abort_requested => {
                    abort_requested = true;
                    self.request_abort().await;
                }
            }
        }
        results
    }

    /// Re-check the call against the host's current schema, then invoke it.
    async fn run_call(&self, call: &SkillCall) -> SkillResult {
        if let Err(e) = self.host.schema().validate(call) {
            warn!(skill = %call.name(), call_id = %call.id(), error = %e, "Call no longer matches the capability schema");
            return SkillResult::failed(call, SkillFailure::from(&e)).with_attempts(0);
        }
        self.host.invoke(call).await
    }

    async fn request_abort(&self) {
        if !self.host.supports_abort() {
            debug!("Host has no abort hook, letting in-flight calls finish");
            return;
        }
        if let Err(e) = self.host.abort().await {
            warn!(error = %e, "Abort request failed");
        }
    }

    fn publish_skill(&self, result: &SkillResult) {
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::SkillExecuted {
                call_id: result.call_id.clone(),
                skill: result.skill.clone(),
                status: result.status,
                failure: result.error.as_ref().map(|f| f.class),
                attempts: result.attempts,
                duration_ms: result.duration_ms,
                timestamp: Utc::now(),
            });
        }
    }
}
