//! Run orchestration: one [`Guardrail`] per configuration, one method per
//! kind of run.
//!
//! Runs are sequential: every provider call is awaited before the next one
//! starts. Overlapping runs must be prevented by the caller.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use costguard_core::report::{
    COST_API_UNAVAILABLE_REASON, INSTANCE_LIMIT_REASON, MANUAL_EMERGENCY_REASON,
    MONTHLY_BUDGET_BREACH_REASON, TAG_ENFORCEMENT_REASON,
};
use costguard_core::{
    keys, ActionFailure, ComplianceVerdict, DesiredAction, Disposition, GuardrailConfig,
    LimitEnforcementResult, Resource, ResourceState, ShutdownReport, SpendCheckResult,
    SpendWindow, TagEnforcementSummary, TagPolicy, TagSet, TriggerSource, VerdictAction,
};
use costguard_provider::CloudProvider;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cost_observer::{
    crossed_alert_levels, get_current_spend, is_breach, utilization_percentage,
};
use crate::error::GuardrailError;
use crate::escalation::EscalationEngine;
use crate::inventory::Inventory;
use crate::limit::enforce_cap;
use crate::notify::Notifier;
use crate::tag_policy::evaluate;
use crate::trigger::confirmation_matches;

pub struct Guardrail {
    config: GuardrailConfig,
    provider: Arc<dyn CloudProvider>,
    notifier: Notifier,
    /// Instance IDs seen by the last successful inventory reads, used when
    /// a shutdown cannot list instances.
    known_instances: Mutex<BTreeSet<String>>,
}

impl Guardrail {
    pub fn new(config: GuardrailConfig, provider: Arc<dyn CloudProvider>, notifier: Notifier) -> Self {
        Guardrail {
            config,
            provider,
            notifier,
            known_instances: Mutex::default(),
        }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    fn engine(&self) -> EscalationEngine<'_> {
        EscalationEngine::new(&*self.provider, &self.config.pricing)
    }

    fn inventory(&self) -> Inventory<'_> {
        Inventory::new(&*self.provider)
    }

    // ── Last-known instances ─────────────────────────────────────────────

    /// Add instance IDs to the last-known set.
    pub fn remember_instances<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.known_instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(ids);
    }

    pub fn known_instances(&self) -> Vec<String> {
        self.known_instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn remember(&self, resources: &[Resource]) {
        self.remember_instances(resources.iter().filter(|r| r.is_instance()).map(|r| r.id.clone()));
    }

    fn forget_halted(&self, report: &ShutdownReport) {
        let mut known = self
            .known_instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for outcome in &report.outcomes {
            if matches!(
                outcome.disposition,
                Disposition::Terminated | Disposition::Missing
            ) {
                known.remove(&outcome.resource_id);
            }
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────

    /// Full shutdown for `reason`, followed by alert and metrics.
    pub async fn shutdown(&self, reason: &str, now: OffsetDateTime) -> ShutdownReport {
        let last_known = self.known_instances();
        let report = self.engine().full_shutdown(reason, &last_known, now).await;
        self.forget_halted(&report);

        tracing::info!(
            reason,
            status = ?report.status,
            terminated = report.terminated_count,
            stopped = report.stopped_count,
            failed = report.failed_count,
            hourly_savings = %report.hourly_savings,
            "shutdown complete"
        );
        self.notifier.notify(&report).await;
        self.notifier.record_metrics(&report).await;
        report
    }

    /// Full shutdown requested by a scheduler, alarm or budget event.
    pub async fn handle_trigger(&self, source: TriggerSource, now: OffsetDateTime) -> ShutdownReport {
        self.shutdown(source.reason(), now).await
    }

    /// Full shutdown from an operator, gated on the typed confirmation.
    ///
    /// A mismatch returns [`GuardrailError::ConfirmationDenied`] before any
    /// provider call is made.
    pub async fn manual_shutdown(
        &self,
        confirmation: &str,
        now: OffsetDateTime,
    ) -> Result<ShutdownReport, GuardrailError> {
        if !confirmation_matches(confirmation) {
            tracing::warn!("manual shutdown cancelled: confirmation mismatch");
            return Err(GuardrailError::ConfirmationDenied);
        }
        Ok(self.shutdown(MANUAL_EMERGENCY_REASON, now).await)
    }

    // ── Spend check ──────────────────────────────────────────────────────

    /// Compare daily and month-to-date spend against the budget and shut
    /// everything down on a breach.
    ///
    /// Fails closed: if billing cannot be read, the shutdown runs anyway
    /// with reason `COST_API_UNAVAILABLE`.
    pub async fn check_spend(&self, now: OffsetDateTime) -> SpendCheckResult {
        let budget = &self.config.budget;
        let provider = &*self.provider;

        let daily = match get_current_spend(provider, &SpendWindow::day_to_date(now)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "billing unreachable, failing closed");
                let report = self.shutdown(COST_API_UNAVAILABLE_REASON, now).await;
                return SpendCheckResult {
                    current_daily_spend: None,
                    daily_limit: budget.daily_limit,
                    utilization_percentage: None,
                    current_monthly_spend: None,
                    monthly_limit: budget.monthly_limit,
                    breach: true,
                    alert_levels_crossed: Vec::new(),
                    shutdown: Some(report),
                };
            }
        };

        let utilization = utilization_percentage(daily.amount, budget.daily_limit);
        let levels = crossed_alert_levels(&daily, budget.daily_limit, &budget.alert_thresholds);
        let daily_breach = is_breach(&daily, budget.daily_limit, budget.shutdown_threshold);

        let monthly = get_current_spend(provider, &SpendWindow::month_to_date(now)).await;
        let current_monthly_spend = monthly.as_ref().ok().map(|m| m.amount);
        let reason = if daily_breach {
            Some(TriggerSource::BudgetBreach.reason())
        } else {
            match &monthly {
                Ok(m) if is_breach(m, budget.monthly_limit, budget.shutdown_threshold) => {
                    Some(MONTHLY_BUDGET_BREACH_REASON)
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "monthly billing unreachable, failing closed");
                    Some(COST_API_UNAVAILABLE_REASON)
                }
            }
        };

        tracing::info!(
            daily_spend = %daily.amount,
            daily_limit = %budget.daily_limit,
            utilization = %utilization,
            breach = reason.is_some(),
            "spend checked"
        );

        let shutdown = match reason {
            Some(reason) => Some(self.shutdown(reason, now).await),
            None => {
                if !levels.is_empty() {
                    self.notifier
                        .notify_budget_warning(&daily, budget.daily_limit, &levels)
                        .await;
                }
                None
            }
        };

        SpendCheckResult {
            current_daily_spend: Some(daily.amount),
            daily_limit: budget.daily_limit,
            utilization_percentage: Some(utilization),
            current_monthly_spend,
            monthly_limit: budget.monthly_limit,
            breach: shutdown.is_some(),
            alert_levels_crossed: levels,
            shutdown,
        }
    }

    // ── Instance cap ─────────────────────────────────────────────────────

    /// Stop the newest billing instances beyond `budget.max_instances`.
    pub async fn enforce_limit(
        &self,
        now: OffsetDateTime,
    ) -> Result<LimitEnforcementResult, GuardrailError> {
        let running = self.inventory().billing_instances().await?;
        self.remember(&running);
        let max_instances = self.config.budget.max_instances;
        let excess_ids = enforce_cap(&running, max_instances);

        let escalation = if excess_ids.is_empty() {
            None
        } else {
            let excess: Vec<Resource> = excess_ids
                .iter()
                .filter_map(|id| running.iter().find(|r| &r.id == id).cloned())
                .collect();
            tracing::info!(
                running = running.len(),
                max_instances,
                excess = excess.len(),
                "instance cap exceeded, stopping newest"
            );
            Some(
                self.engine()
                    .execute(&excess, DesiredAction::Stop, INSTANCE_LIMIT_REASON, now)
                    .await,
            )
        };

        Ok(LimitEnforcementResult {
            running_count: running.len(),
            max_instances,
            excess_ids,
            escalation,
        })
    }

    // ── Tag policy ───────────────────────────────────────────────────────

    /// Verdicts for every instance, volume and snapshot, with no side effects.
    pub async fn evaluate(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<ComplianceVerdict>, GuardrailError> {
        let inventory = self.inventory();
        let instances = inventory.taggable_instances().await?;
        self.remember(&instances);
        let volumes = inventory.volumes().await?;
        let snapshots = inventory.snapshots().await?;

        Ok(instances
            .iter()
            .chain(&volumes)
            .chain(&snapshots)
            .map(|r| self.verdict(r, now))
            .collect())
    }

    fn verdict(&self, resource: &Resource, now: OffsetDateTime) -> ComplianceVerdict {
        evaluate(resource, &self.config.tags, &self.config.schedule, now)
    }

    /// Apply the tag policy.
    ///
    /// Instances: terminate verdicts go through the escalation ladder, warn
    /// verdicts get violation markers. Volumes: expired violations on
    /// unattached volumes are deleted, every other violation is marked.
    /// Snapshots: expired violations older than the minimum snapshot age
    /// are deleted. Per-resource failures are recorded and skipped.
    pub async fn enforce_tags(
        &self,
        now: OffsetDateTime,
    ) -> Result<TagEnforcementSummary, GuardrailError> {
        let inventory = self.inventory();
        let instances = inventory.taggable_instances().await?;
        self.remember(&instances);
        let volumes = inventory.volumes().await?;
        let snapshots = inventory.snapshots().await?;

        let mut summary = TagEnforcementSummary {
            violations_found: 0,
            instances_tagged: 0,
            instances_terminated: 0,
            volumes_tagged: 0,
            volumes_deleted: 0,
            snapshots_deleted: 0,
            estimated_monthly_savings: Decimal::ZERO,
            verdicts: Vec::new(),
            failures: Vec::new(),
            escalation: None,
        };

        // Instances
        let mut plan: Vec<(&Resource, DesiredAction)> = Vec::new();
        for instance in &instances {
            let verdict = self.verdict(instance, now);
            if verdict.is_violation() {
                summary.violations_found += 1;
            }
            match verdict.action {
                VerdictAction::Terminate => {
                    let desired = if instance.state == ResourceState::Stopping {
                        DesiredAction::ForceTerminate
                    } else {
                        DesiredAction::Terminate
                    };
                    tracing::info!(resource_id = %instance.id, cause = ?verdict.cause, "terminating for tag policy");
                    plan.push((instance, desired));
                }
                VerdictAction::Warn => {
                    tracing::warn!(
                        resource_id = %instance.id,
                        missing = ?verdict.missing_tags,
                        invalid = ?verdict.invalid_tags,
                        deadline = %verdict.grace_deadline,
                        "tag violation inside grace period"
                    );
                    if self.mark(instance, &verdict, &mut summary.failures).await {
                        summary.instances_tagged += 1;
                    }
                }
                VerdictAction::None => {}
            }
            summary.verdicts.push(verdict);
        }
        if !plan.is_empty() {
            let report = self
                .engine()
                .execute_plan(&plan, TAG_ENFORCEMENT_REASON, now)
                .await;
            self.forget_halted(&report);
            summary.instances_terminated = report.terminated_count;
            summary.estimated_monthly_savings += report.monthly_savings;
            summary.escalation = Some(report);
        }

        // Volumes
        for volume in &volumes {
            let verdict = self.verdict(volume, now);
            if !verdict.is_violation() {
                summary.verdicts.push(verdict);
                continue;
            }
            summary.violations_found += 1;
            if verdict.is_terminate() && volume.state == ResourceState::Available {
                match self.provider.delete_volume(&volume.id).await {
                    Ok(()) => {
                        summary.volumes_deleted += 1;
                        summary.estimated_monthly_savings +=
                            self.config.pricing.storage_monthly_cost(volume);
                    }
                    Err(e) => {
                        tracing::error!(volume = %volume.id, error = %e, "volume deletion failed");
                        summary.failures.push(ActionFailure::new(
                            volume.id.clone(),
                            "delete_volume",
                            e.to_string(),
                        ));
                    }
                }
            } else if self.mark(volume, &verdict, &mut summary.failures).await {
                summary.volumes_tagged += 1;
            }
            summary.verdicts.push(verdict);
        }

        // Snapshots
        let min_age = self.config.tags.snapshot_min_age();
        for snapshot in &snapshots {
            let verdict = self.verdict(snapshot, now);
            if verdict.is_violation() {
                summary.violations_found += 1;
                if verdict.is_terminate() && snapshot.age(now) > min_age {
                    match self.provider.delete_snapshot(&snapshot.id).await {
                        Ok(()) => {
                            summary.snapshots_deleted += 1;
                            summary.estimated_monthly_savings +=
                                self.config.pricing.storage_monthly_cost(snapshot);
                        }
                        Err(e) => {
                            tracing::error!(snapshot = %snapshot.id, error = %e, "snapshot deletion failed");
                            summary.failures.push(ActionFailure::new(
                                snapshot.id.clone(),
                                "delete_snapshot",
                                e.to_string(),
                            ));
                        }
                    }
                }
            }
            summary.verdicts.push(verdict);
        }

        tracing::info!(
            violations = summary.violations_found,
            instances_tagged = summary.instances_tagged,
            instances_terminated = summary.instances_terminated,
            volumes_deleted = summary.volumes_deleted,
            snapshots_deleted = summary.snapshots_deleted,
            failures = summary.failures.len(),
            "tag enforcement complete"
        );
        Ok(summary)
    }

    /// Write violation markers unless they are already in place. Returns
    /// whether a write happened.
    async fn mark(
        &self,
        resource: &Resource,
        verdict: &ComplianceVerdict,
        failures: &mut Vec<ActionFailure>,
    ) -> bool {
        let markers = violation_markers(resource, verdict, &self.config.tags);
        if markers
            .iter()
            .all(|(k, v)| resource.tags.get(k) == Some(v))
        {
            return false;
        }
        match self.provider.write_tags(&resource.id, &markers).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(resource_id = %resource.id, error = %e, "writing violation markers failed");
                failures.push(ActionFailure::new(
                    resource.id.clone(),
                    "write_tags",
                    e.to_string(),
                ));
                false
            }
        }
    }
}

/// Marker tags written onto a resource in violation:
/// `VIOLATION=MISSING_TAGS` and `TERMINATION_TIME=<grace deadline>`.
///
/// `AutoDelete=true` is added only when the resource carries no value for
/// it. A key the policy requires is never written, so markers cannot make
/// a resource compliant.
pub fn violation_markers(
    resource: &Resource,
    verdict: &ComplianceVerdict,
    policy: &TagPolicy,
) -> TagSet {
    let deadline = verdict
        .grace_deadline
        .format(&Rfc3339)
        .unwrap_or_else(|_| verdict.grace_deadline.to_string());
    let mut tags = TagSet::new();
    let mut add = |key: &str, value: &str| {
        if policy.rule(key).is_none() {
            tags.insert(key, value);
        }
    };
    add(keys::VIOLATION, keys::MISSING_TAGS);
    add(keys::TERMINATION_TIME, &deadline);
    if resource.tags.get(keys::AUTO_DELETE).is_none() {
        add(keys::AUTO_DELETE, "true");
    }
    tags
}
