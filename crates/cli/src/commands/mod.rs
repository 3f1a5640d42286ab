//! Subcommand implementations. Each `cmd_*` prints its result and exits
//! non-zero on failure.

mod emergency;
mod runs;

pub(crate) use emergency::cmd_emergency;
pub(crate) use runs::{
    cmd_check_spend, cmd_enforce_limit, cmd_enforce_tags, cmd_evaluate, cmd_shutdown,
};

use std::future::Future;
use std::process;

use costguard_core::RunResponse;
use serde::Serialize;

use crate::{report_error, OutputFormat};

/// Drive one run to completion on a fresh runtime.
pub(crate) fn block_on<F: Future>(future: F, output: OutputFormat, quiet: bool) -> F::Output {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(future),
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Print a run result. JSON output is the `{status_code, body}` envelope
/// and is printed even with `--quiet`.
pub(crate) fn emit<T: Serialize>(
    result: &T,
    output: OutputFormat,
    quiet: bool,
    text: impl FnOnce(&T) -> String,
) {
    match output {
        OutputFormat::Json => {
            let response = RunResponse::ok(result);
            let json = serde_json::to_string_pretty(&response)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
            if response.status_code != 200 {
                process::exit(1);
            }
        }
        OutputFormat::Text => {
            if !quiet {
                print!("{}", text(result));
            }
        }
    }
}
