//! Plain-text rendering of run results for `--output text`.

use costguard_core::{
    ComplianceVerdict, LimitEnforcementResult, ReportStatus, ShutdownReport, SpendCheckResult,
    TagEnforcementSummary, VerdictAction,
};

fn status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Complete => "complete",
        ReportStatus::Partial => "partial",
        ReportStatus::Degraded => "degraded",
    }
}

fn join(keys: &std::collections::BTreeSet<String>) -> String {
    keys.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub(crate) fn shutdown(report: &ShutdownReport) -> String {
    let mut out = format!(
        "Shutdown ({}): {}\n",
        report.reason,
        status_label(report.status)
    );
    out.push_str(&format!("  Instances terminated:    {}\n", report.terminated_count));
    out.push_str(&format!("  Instances stopped:       {}\n", report.stopped_count));
    out.push_str(&format!("  Instances failed:        {}\n", report.failed_count));
    out.push_str(&format!(
        "  Spot requests cancelled: {}\n",
        report.spot_requests_cancelled
    ));
    out.push_str(&format!("  Volumes deleted:         {}\n", report.volumes_deleted));
    out.push_str(&format!(
        "  Savings: {}/hour, {}/day, {}/month\n",
        report.hourly_savings, report.daily_savings, report.monthly_savings
    ));
    if !report.storage_monthly_savings.is_zero() {
        out.push_str(&format!(
            "  Storage savings: {}/month\n",
            report.storage_monthly_savings
        ));
    }
    if report.is_degraded() {
        out.push_str("  Inventory unreachable: acted on last-known instances only\n");
    }
    if !report.failures.is_empty() {
        out.push_str("  Failures:\n");
        for failure in &report.failures {
            out.push_str(&format!(
                "    {} {}: {}\n",
                failure.resource_id, failure.action, failure.message
            ));
        }
    }
    out
}

pub(crate) fn spend_check(result: &SpendCheckResult) -> String {
    let mut out = String::new();
    match (result.current_daily_spend, result.utilization_percentage) {
        (Some(spend), Some(pct)) => out.push_str(&format!(
            "Daily spend: {} of {} ({}%)\n",
            spend, result.daily_limit, pct
        )),
        _ => out.push_str(&format!(
            "Daily spend: unavailable (limit {})\n",
            result.daily_limit
        )),
    }
    if let Some(monthly) = result.current_monthly_spend {
        out.push_str(&format!(
            "Monthly spend: {} of {}\n",
            monthly, result.monthly_limit
        ));
    }
    if !result.alert_levels_crossed.is_empty() {
        let levels: Vec<String> = result
            .alert_levels_crossed
            .iter()
            .map(|l| l.to_string())
            .collect();
        out.push_str(&format!("Alert levels crossed: {}\n", levels.join(", ")));
    }
    out.push_str(&format!(
        "Breach: {}\n",
        if result.breach { "yes" } else { "no" }
    ));
    if let Some(report) = &result.shutdown {
        out.push('\n');
        out.push_str(&shutdown(report));
    }
    out
}

pub(crate) fn verdict_line(verdict: &ComplianceVerdict) -> String {
    let action = match verdict.action {
        VerdictAction::None => "ok",
        VerdictAction::Warn => "warn",
        VerdictAction::Terminate => "terminate",
    };
    let mut line = format!("{:<24} {:<9}", verdict.resource_id, action);
    if !verdict.missing_tags.is_empty() {
        line.push_str(&format!(" missing: {}", join(&verdict.missing_tags)));
    }
    if !verdict.invalid_tags.is_empty() {
        line.push_str(&format!(" invalid: {}", join(&verdict.invalid_tags)));
    }
    if let Some(cause) = verdict.cause {
        line.push_str(&format!(" ({:?})", cause));
    }
    line
}

pub(crate) fn verdicts(verdicts: &[ComplianceVerdict]) -> String {
    let violations = verdicts.iter().filter(|v| v.is_violation()).count();
    let mut out = format!(
        "Evaluated {} resources, {} in violation\n",
        verdicts.len(),
        violations
    );
    for verdict in verdicts {
        out.push_str("  ");
        out.push_str(&verdict_line(verdict));
        out.push('\n');
    }
    out
}

pub(crate) fn tag_enforcement(summary: &TagEnforcementSummary) -> String {
    let mut out = format!("Tag enforcement: {} violations\n", summary.violations_found);
    out.push_str(&format!("  Instances tagged:     {}\n", summary.instances_tagged));
    out.push_str(&format!(
        "  Instances terminated: {}\n",
        summary.instances_terminated
    ));
    out.push_str(&format!("  Volumes tagged:       {}\n", summary.volumes_tagged));
    out.push_str(&format!("  Volumes deleted:      {}\n", summary.volumes_deleted));
    out.push_str(&format!("  Snapshots deleted:    {}\n", summary.snapshots_deleted));
    out.push_str(&format!(
        "  Estimated monthly savings: {}\n",
        summary.estimated_monthly_savings
    ));
    if !summary.failures.is_empty() {
        out.push_str("  Failures:\n");
        for failure in &summary.failures {
            out.push_str(&format!(
                "    {} {}: {}\n",
                failure.resource_id, failure.action, failure.message
            ));
        }
    }
    out
}

pub(crate) fn limit(result: &LimitEnforcementResult) -> String {
    let mut out = format!(
        "Running instances: {} (cap {})\n",
        result.running_count, result.max_instances
    );
    if result.excess_ids.is_empty() {
        out.push_str("Within cap\n");
    } else {
        out.push_str(&format!("Excess: {}\n", result.excess_ids.join(", ")));
    }
    if let Some(report) = &result.escalation {
        out.push('\n');
        out.push_str(&shutdown(report));
    }
    out
}
