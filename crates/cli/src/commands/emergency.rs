use std::io::Write;
use std::process;

use costguard_engine::{Guardrail, GuardrailError, CONFIRMATION_PHRASE};
use time::OffsetDateTime;

use super::{block_on, emit};
use crate::{render, report_error, OutputFormat};

/// Exit code for a shutdown the operator did not confirm.
const EXIT_CANCELLED: i32 = 2;

/// Interactive full shutdown. Reads the confirmation from stdin unless
/// `--confirm` supplied it.
pub(crate) fn cmd_emergency(
    guardrail: &Guardrail,
    confirm: Option<&str>,
    now: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) {
    let confirmation = match confirm {
        Some(phrase) => phrase.to_string(),
        None => {
            eprintln!("EMERGENCY SHUTDOWN");
            eprintln!("This terminates every instance, cancels spot requests and deletes");
            eprintln!("unattached volumes, regardless of tags.");
            eprint!("Type '{}' to confirm: ", CONFIRMATION_PHRASE);
            let _ = std::io::stderr().flush();

            let mut input = String::new();
            if let Err(e) = std::io::stdin().read_line(&mut input) {
                report_error(&format!("cannot read confirmation: {}", e), output, quiet);
                process::exit(1);
            }
            input
        }
    };

    match block_on(guardrail.manual_shutdown(&confirmation, now), output, quiet) {
        Ok(report) => emit(&report, output, quiet, render::shutdown),
        Err(GuardrailError::ConfirmationDenied) => {
            report_error("Shutdown cancelled", output, quiet);
            process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            report_error(&format!("shutdown failed: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
