//! Escalation Engine: drives resources through the termination ladder.
//!
//! Each desired outcome maps to an ordered list of [`LadderStep`]s. A
//! failed rung advances to the next one; a not-found resource ends its
//! ladder without counting as a failure. One resource failing never aborts
//! the rest of the batch.
//!
//! | desired | ladder |
//! |---|---|
//! | `stop` | stop, force-stop, terminate |
//! | `terminate` | terminate, force-stop |
//! | `force_terminate` | terminate |
//!
//! When the inventory itself is unreachable, [`EscalationEngine::full_shutdown`]
//! falls back to batch-terminating the last known instance IDs in chunks of
//! [`NUCLEAR_BATCH_SIZE`] and marks the report degraded.

use costguard_core::{
    ActionFailure, DesiredAction, Disposition, LadderStep, PricingTable, ReportStatus, Resource,
    ResourceOutcome, ResourceState, Savings, ShutdownReport, StepAttempt,
};
use costguard_provider::{CloudProvider, ProviderError};
use time::OffsetDateTime;

use crate::inventory::Inventory;

/// Maximum IDs per batch terminate call.
pub const NUCLEAR_BATCH_SIZE: usize = 100;

/// The ordered fallback rungs for `desired`.
pub fn ladder(desired: DesiredAction) -> &'static [LadderStep] {
    match desired {
        DesiredAction::Stop => &[LadderStep::Stop, LadderStep::ForceStop, LadderStep::Terminate],
        DesiredAction::Terminate => &[LadderStep::Terminate, LadderStep::ForceStop],
        DesiredAction::ForceTerminate => &[LadderStep::Terminate],
    }
}

fn desired_label(desired: DesiredAction) -> &'static str {
    match desired {
        DesiredAction::Stop => "stop",
        DesiredAction::Terminate => "terminate",
        DesiredAction::ForceTerminate => "force_terminate",
    }
}

fn attempt_errors(outcome: &ResourceOutcome) -> String {
    outcome
        .attempts
        .iter()
        .filter_map(|a| a.error.as_deref())
        .collect::<Vec<_>>()
        .join("; ")
}

// ──────────────────────────────────────────────
// Report accumulation
// ──────────────────────────────────────────────

/// Accumulates outcomes and savings, then writes the report once.
struct ReportBuilder {
    report: ShutdownReport,
    savings: Savings,
}

impl ReportBuilder {
    fn new(reason: &str, now: OffsetDateTime) -> Self {
        ReportBuilder {
            report: ShutdownReport::new(reason, now),
            savings: Savings::default(),
        }
    }

    fn record(&mut self, outcome: ResourceOutcome, hourly_rate: rust_decimal::Decimal) {
        match outcome.disposition {
            Disposition::Terminated => {
                self.report.terminated_count += 1;
                self.savings = self.savings + Savings::from_hourly(hourly_rate);
            }
            Disposition::Stopped => {
                self.report.stopped_count += 1;
                self.savings = self.savings + Savings::from_hourly(hourly_rate);
                // Billing is halted but the instance still exists.
                if outcome.desired != DesiredAction::Stop {
                    self.report.failures.push(ActionFailure::new(
                        outcome.resource_id.clone(),
                        desired_label(outcome.desired),
                        attempt_errors(&outcome),
                    ));
                }
            }
            Disposition::Missing => {}
            Disposition::Failed => {
                self.report.failed_count += 1;
                self.report.failures.push(ActionFailure::new(
                    outcome.resource_id.clone(),
                    desired_label(outcome.desired),
                    attempt_errors(&outcome),
                ));
            }
        }
        self.report.outcomes.push(outcome);
    }

    fn fail(&mut self, failure: ActionFailure) {
        self.report.failures.push(failure);
    }

    fn finish(mut self) -> ShutdownReport {
        self.report.hourly_savings = self.savings.hourly;
        self.report.daily_savings = self.savings.daily;
        self.report.monthly_savings = self.savings.monthly;
        if self.report.status != ReportStatus::Degraded
            && (self.report.failed_count > 0 || !self.report.failures.is_empty())
        {
            self.report.status = ReportStatus::Partial;
        }
        self.report
    }
}

// ──────────────────────────────────────────────
// EscalationEngine
// ──────────────────────────────────────────────

pub struct EscalationEngine<'a> {
    provider: &'a dyn CloudProvider,
    pricing: &'a PricingTable,
}

impl<'a> EscalationEngine<'a> {
    pub fn new(provider: &'a dyn CloudProvider, pricing: &'a PricingTable) -> Self {
        EscalationEngine { provider, pricing }
    }

    async fn apply(&self, step: LadderStep, id: &str) -> Result<(), ProviderError> {
        match step {
            LadderStep::Stop => self.provider.stop_instance(id, false).await,
            LadderStep::ForceStop => self.provider.stop_instance(id, true).await,
            LadderStep::Terminate => self.provider.terminate_instance(id).await,
            LadderStep::BatchTerminate => {
                self.provider.terminate_instances(&[id.to_string()]).await
            }
        }
    }

    /// Run one resource down its ladder.
    pub async fn escalate(
        &self,
        resource_id: &str,
        type_class: Option<&str>,
        desired: DesiredAction,
    ) -> ResourceOutcome {
        let mut attempts = Vec::new();
        let mut disposition = Disposition::Failed;

        for &step in ladder(desired) {
            match self.apply(step, resource_id).await {
                Ok(()) => {
                    attempts.push(StepAttempt { step, error: None });
                    disposition = match step {
                        LadderStep::Terminate | LadderStep::BatchTerminate => {
                            Disposition::Terminated
                        }
                        LadderStep::Stop | LadderStep::ForceStop => Disposition::Stopped,
                    };
                    break;
                }
                Err(e) if e.is_not_found() => {
                    tracing::info!(resource_id, step = %step, "resource already gone");
                    attempts.push(StepAttempt {
                        step,
                        error: Some(e.to_string()),
                    });
                    disposition = Disposition::Missing;
                    break;
                }
                Err(e) => {
                    tracing::error!(resource_id, step = %step, error = %e, "escalation step failed");
                    attempts.push(StepAttempt {
                        step,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        ResourceOutcome {
            resource_id: resource_id.to_string(),
            type_class: type_class.map(str::to_string),
            desired,
            disposition,
            attempts,
        }
    }

    /// Drive every resource toward `desired`.
    pub async fn execute(
        &self,
        resources: &[Resource],
        desired: DesiredAction,
        reason: &str,
        now: OffsetDateTime,
    ) -> ShutdownReport {
        let plan: Vec<(&Resource, DesiredAction)> =
            resources.iter().map(|r| (r, desired)).collect();
        self.execute_plan(&plan, reason, now).await
    }

    /// Drive each resource toward its own desired action.
    pub async fn execute_plan(
        &self,
        plan: &[(&Resource, DesiredAction)],
        reason: &str,
        now: OffsetDateTime,
    ) -> ShutdownReport {
        let mut builder = ReportBuilder::new(reason, now);
        for (resource, desired) in plan {
            let outcome = self
                .escalate(&resource.id, Some(&resource.type_class), *desired)
                .await;
            builder.record(outcome, self.pricing.hourly_rate(&resource.type_class));
        }
        builder.finish()
    }

    /// Drive bare IDs toward `desired`, priced at the default rate.
    pub async fn execute_ids(
        &self,
        ids: &[String],
        desired: DesiredAction,
        reason: &str,
        now: OffsetDateTime,
    ) -> ShutdownReport {
        let mut builder = ReportBuilder::new(reason, now);
        for id in ids {
            let outcome = self.escalate(id, None, desired).await;
            builder.record(outcome, self.pricing.default_hourly);
        }
        builder.finish()
    }

    /// Stop everything: every billing instance, live spot requests and
    /// unattached volumes, regardless of tags.
    ///
    /// `last_known_ids` is only used when the instance inventory cannot be
    /// read.
    pub async fn full_shutdown(
        &self,
        reason: &str,
        last_known_ids: &[String],
        now: OffsetDateTime,
    ) -> ShutdownReport {
        let inventory = Inventory::new(self.provider);
        let instances = match inventory.all_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                tracing::error!(error = %e, known = last_known_ids.len(), "inventory unreachable, falling back to batch terminate");
                return self.nuclear(reason, last_known_ids, &e, now).await;
            }
        };

        let plan: Vec<(&Resource, DesiredAction)> = instances
            .iter()
            .filter_map(|r| match r.state {
                ResourceState::Running | ResourceState::Pending => {
                    Some((r, DesiredAction::Terminate))
                }
                ResourceState::Stopping => Some((r, DesiredAction::ForceTerminate)),
                _ => None,
            })
            .collect();

        let mut builder = ReportBuilder::new(reason, now);
        for (resource, desired) in &plan {
            let outcome = self
                .escalate(&resource.id, Some(&resource.type_class), *desired)
                .await;
            builder.record(outcome, self.pricing.hourly_rate(&resource.type_class));
        }

        self.cancel_spot_requests(&inventory, &mut builder).await;
        self.delete_unattached_volumes(&inventory, &mut builder).await;
        builder.finish()
    }

    async fn cancel_spot_requests(&self, inventory: &Inventory<'_>, builder: &mut ReportBuilder) {
        let requests = match inventory.live_spot_requests().await {
            Ok(requests) => requests,
            Err(e) => {
                builder.fail(ActionFailure::new("*", "list_spot_requests", e.to_string()));
                return;
            }
        };
        if requests.is_empty() {
            return;
        }
        let ids: Vec<String> = requests.into_iter().map(|r| r.id).collect();
        match self.provider.cancel_spot_requests(&ids).await {
            Ok(n) => builder.report.spot_requests_cancelled = n,
            Err(e) => {
                tracing::error!(error = %e, count = ids.len(), "spot request cancellation failed");
                builder.fail(ActionFailure::new(ids.join(","), "cancel_spot_requests", e.to_string()));
            }
        }
    }

    async fn delete_unattached_volumes(
        &self,
        inventory: &Inventory<'_>,
        builder: &mut ReportBuilder,
    ) {
        let volumes = match inventory.unattached_volumes().await {
            Ok(volumes) => volumes,
            Err(e) => {
                builder.fail(ActionFailure::new("*", "list_volumes", e.to_string()));
                return;
            }
        };
        for volume in volumes {
            match self.provider.delete_volume(&volume.id).await {
                Ok(()) => {
                    builder.report.volumes_deleted += 1;
                    builder.report.storage_monthly_savings +=
                        self.pricing.storage_monthly_cost(&volume);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::error!(volume = %volume.id, error = %e, "volume deletion failed");
                    builder.fail(ActionFailure::new(volume.id, "delete_volume", e.to_string()));
                }
            }
        }
    }

    /// Batch-terminate `ids` in chunks, without consulting the inventory.
    ///
    /// The report is always [`ReportStatus::Degraded`] and carries the
    /// inventory error that forced this path.
    pub async fn nuclear(
        &self,
        reason: &str,
        ids: &[String],
        cause: &ProviderError,
        now: OffsetDateTime,
    ) -> ShutdownReport {
        let mut builder = ReportBuilder::new(reason, now);
        builder.report.status = ReportStatus::Degraded;
        builder.fail(ActionFailure::new("*", "list_resources", cause.to_string()));

        for chunk in ids.chunks(NUCLEAR_BATCH_SIZE) {
            let result = self.provider.terminate_instances(chunk).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, batch = chunk.len(), "batch terminate failed");
            }
            for id in chunk {
                let (disposition, error) = match &result {
                    Ok(()) => (Disposition::Terminated, None),
                    Err(e) => (Disposition::Failed, Some(e.to_string())),
                };
                let outcome = ResourceOutcome {
                    resource_id: id.clone(),
                    type_class: None,
                    desired: DesiredAction::Terminate,
                    disposition,
                    attempts: vec![StepAttempt {
                        step: LadderStep::BatchTerminate,
                        error,
                    }],
                };
                builder.record(outcome, self.pricing.default_hourly);
            }
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costguard_core::ResourceKind;
    use costguard_provider::{MemoryProvider, ProviderOp};
    use rust_decimal::Decimal;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-04-01 12:00 UTC);

    fn instance(id: &str, class: &str, state: ResourceState) -> Resource {
        Resource::new(id, ResourceKind::ComputeInstance, class, state, datetime!(2026-04-01 8:00 UTC))
    }

    fn unavailable() -> ProviderError {
        ProviderError::Unavailable("throttled".into())
    }

    fn steps(outcome: &ResourceOutcome) -> Vec<LadderStep> {
        outcome.attempts.iter().map(|a| a.step).collect()
    }

    // -- ladder --

    #[test]
    fn ladders_are_ordered_fallbacks() {
        assert_eq!(
            ladder(DesiredAction::Stop),
            &[LadderStep::Stop, LadderStep::ForceStop, LadderStep::Terminate]
        );
        assert_eq!(
            ladder(DesiredAction::Terminate),
            &[LadderStep::Terminate, LadderStep::ForceStop]
        );
        assert_eq!(ladder(DesiredAction::ForceTerminate), &[LadderStep::Terminate]);
    }

    #[tokio::test]
    async fn stop_escalates_through_force_stop_to_terminate() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "t3.medium", ResourceState::Running));
        provider.fail_on("i-1", ProviderOp::Stop, unavailable());
        provider.fail_on("i-1", ProviderOp::ForceStop, unavailable());
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let outcome = engine.escalate("i-1", None, DesiredAction::Stop).await;
        assert_eq!(outcome.disposition, Disposition::Terminated);
        assert_eq!(
            steps(&outcome),
            vec![LadderStep::Stop, LadderStep::ForceStop, LadderStep::Terminate]
        );
    }

    #[tokio::test]
    async fn failed_terminate_falls_back_to_force_stop() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "t3.medium", ResourceState::Running));
        provider.fail_on("i-1", ProviderOp::Terminate, unavailable());
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let resources = vec![provider.resource("i-1").unwrap()];
        let report = engine
            .execute(&resources, DesiredAction::Terminate, "TEST", NOW)
            .await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.disposition, Disposition::Stopped);
        assert_eq!(outcome.final_step(), Some(LadderStep::ForceStop));

        // Billing halted, but the terminate itself did not happen.
        assert_eq!(report.stopped_count, 1);
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.status, ReportStatus::Partial);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource_id, "i-1");
        assert_eq!(report.failures[0].action, "terminate");
        assert!(report.failures[0].message.contains("throttled"));
        assert_eq!(
            provider.resource("i-1").map(|r| r.state),
            Some(ResourceState::Stopped)
        );
    }

    #[tokio::test]
    async fn stop_that_succeeds_is_complete() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "t3.medium", ResourceState::Running));
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let resources = vec![provider.resource("i-1").unwrap()];
        let report = engine
            .execute(&resources, DesiredAction::Stop, "TEST", NOW)
            .await;
        assert_eq!(report.stopped_count, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.status, ReportStatus::Complete);
    }

    #[tokio::test]
    async fn not_found_ends_the_ladder_without_failure() {
        let provider = MemoryProvider::new();
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let report = engine
            .execute_ids(&["i-gone".to_string()], DesiredAction::Terminate, "TEST", NOW)
            .await;
        assert_eq!(report.outcomes[0].disposition, Disposition::Missing);
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(provider.call_count(), 1);
    }

    // -- batch isolation --

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "m5.xlarge", ResourceState::Running))
            .with_resource(instance("i-2", "m5.xlarge", ResourceState::Running))
            .with_resource(instance("i-3", "m5.xlarge", ResourceState::Running));
        provider.fail_on("i-2", ProviderOp::Terminate, unavailable());
        provider.fail_on("i-2", ProviderOp::ForceStop, unavailable());
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let resources = vec![
            provider.resource("i-1").unwrap(),
            provider.resource("i-2").unwrap(),
            provider.resource("i-3").unwrap(),
        ];
        let report = engine
            .execute(&resources, DesiredAction::Terminate, "TEST", NOW)
            .await;

        assert_eq!(report.terminated_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.status, ReportStatus::Partial);
        assert_eq!(report.failures[0].resource_id, "i-2");
        assert_eq!(
            provider.resource("i-3").map(|r| r.state),
            Some(ResourceState::Terminated)
        );
    }

    // -- savings --

    #[tokio::test]
    async fn savings_sum_hourly_rates_of_halted_instances() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "m5.xlarge", ResourceState::Running))
            .with_resource(instance("i-2", "t3.large", ResourceState::Running));
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let resources = vec![
            provider.resource("i-1").unwrap(),
            provider.resource("i-2").unwrap(),
        ];
        let report = engine
            .execute(&resources, DesiredAction::Terminate, "TEST", NOW)
            .await;

        let hourly: Decimal = "0.2752".parse().unwrap();
        assert_eq!(report.hourly_savings, hourly);
        assert_eq!(report.daily_savings, hourly * Decimal::from(24));
        assert_eq!(report.monthly_savings, hourly * Decimal::from(24) * Decimal::from(30));
    }

    #[tokio::test]
    async fn unknown_classes_are_priced_at_the_default_rate() {
        let provider = MemoryProvider::new()
            .with_resource(instance("i-1", "x9.mystery", ResourceState::Running));
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);
        let resources = vec![provider.resource("i-1").unwrap()];
        let report = engine
            .execute(&resources, DesiredAction::Terminate, "TEST", NOW)
            .await;
        assert_eq!(report.hourly_savings, "0.10".parse::<Decimal>().unwrap());
    }

    // -- full shutdown --

    #[tokio::test]
    async fn full_shutdown_handles_every_kind() {
        let created = datetime!(2026-04-01 8:00 UTC);
        let provider = MemoryProvider::new()
            .with_resource(instance("i-run", "m5.xlarge", ResourceState::Running))
            .with_resource(instance("i-stopping", "t3.medium", ResourceState::Stopping))
            .with_resource(instance("i-stopped", "t3.medium", ResourceState::Stopped))
            .with_resource(Resource::new("sir-1", ResourceKind::SpotRequest, "m5.xlarge", ResourceState::Open, created))
            .with_resource(
                Resource::new("vol-1", ResourceKind::Volume, "gp3", ResourceState::Available, created)
                    .with_size_gb(50),
            )
            .with_resource(Resource::new("vol-2", ResourceKind::Volume, "gp3", ResourceState::Attached, created));
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let report = engine.full_shutdown("BUDGET_BREACH", &[], NOW).await;

        assert_eq!(report.terminated_count, 2);
        assert_eq!(report.spot_requests_cancelled, 1);
        assert_eq!(report.volumes_deleted, 1);
        assert_eq!(report.storage_monthly_savings, "5.00".parse::<Decimal>().unwrap());
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(
            provider.resource("i-stopped").map(|r| r.state),
            Some(ResourceState::Stopped)
        );
        assert!(provider.resource("vol-2").is_some());
        // Stopping instances go straight to terminate.
        let stopping = report
            .outcomes
            .iter()
            .find(|o| o.resource_id == "i-stopping")
            .unwrap();
        assert_eq!(stopping.desired, DesiredAction::ForceTerminate);
        assert_eq!(steps(stopping), vec![LadderStep::Terminate]);
    }

    #[tokio::test]
    async fn inventory_outage_goes_nuclear_in_batches() {
        let provider = MemoryProvider::new();
        provider.set_inventory_down(true);
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let ids: Vec<String> = (0..250).map(|i| format!("i-{:03}", i)).collect();
        let report = engine.full_shutdown("ALARM_TRIGGERED", &ids, NOW).await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.terminated_count, 250);
        let batches = provider.calls_of(ProviderOp::BatchTerminate);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].target.split(',').count(), 100);
        assert_eq!(batches[2].target.split(',').count(), 50);
        assert!(report.failures.iter().any(|f| f.action == "list_resources"));
    }

    #[tokio::test]
    async fn failed_batch_marks_its_members_failed() {
        let provider = MemoryProvider::new();
        provider.set_inventory_down(true);
        provider.fail_on("i-150", ProviderOp::BatchTerminate, unavailable());
        let pricing = PricingTable::default();
        let engine = EscalationEngine::new(&provider, &pricing);

        let ids: Vec<String> = (0..200).map(|i| format!("i-{}", i)).collect();
        let report = engine
            .nuclear("ALARM_TRIGGERED", &ids, &unavailable(), NOW)
            .await;
        assert_eq!(report.terminated_count, 100);
        assert_eq!(report.failed_count, 100);
        assert_eq!(report.status, ReportStatus::Degraded);
    }
}
