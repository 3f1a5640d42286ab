use std::process;

use costguard_core::TriggerSource;
use costguard_engine::Guardrail;
use time::OffsetDateTime;

use super::{block_on, emit};
use crate::{render, report_error, OutputFormat};

pub(crate) fn cmd_check_spend(
    guardrail: &Guardrail,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    let result = block_on(guardrail.check_spend(now), output, quiet);
    emit(&result, output, quiet, render::spend_check);
}

pub(crate) fn cmd_shutdown(
    guardrail: &Guardrail,
    source: TriggerSource,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    let report = block_on(guardrail.handle_trigger(source, now), output, quiet);
    emit(&report, output, quiet, render::shutdown);
}

pub(crate) fn cmd_enforce_tags(
    guardrail: &Guardrail,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    match block_on(guardrail.enforce_tags(now), output, quiet) {
        Ok(summary) => emit(&summary, output, quiet, render::tag_enforcement),
        Err(e) => {
            report_error(&format!("tag enforcement failed: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_enforce_limit(
    guardrail: &Guardrail,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    match block_on(guardrail.enforce_limit(now), output, quiet) {
        Ok(result) => emit(&result, output, quiet, render::limit),
        Err(e) => {
            report_error(&format!("limit enforcement failed: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_evaluate(
    guardrail: &Guardrail,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    match block_on(guardrail.evaluate(now), output, quiet) {
        Ok(verdicts) => emit(&verdicts, output, quiet, |v| render::verdicts(v)),
        Err(e) => {
            report_error(&format!("evaluation failed: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
