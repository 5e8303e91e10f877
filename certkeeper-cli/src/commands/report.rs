//! Human and JSON rendering of reconciliation outcomes.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use certkeeper_core::{Action, ReconciliationResult, RequestId};
use certkeeper_reconcile::ReconcileError;

pub type Outcome = Result<ReconciliationResult, ReconcileError>;

/// JSON shape of one outcome. Successful entries flatten the result; failed
/// ones still report whether the daemon was changed before the failure.
#[derive(Serialize)]
#[serde(untagged)]
pub enum OutcomeJson<'a> {
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        entry: Option<usize>,
        failed: bool,
        #[serde(flatten)]
        result: &'a ReconciliationResult,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        entry: Option<usize>,
        failed: bool,
        changed: bool,
        action: Action,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<&'a RequestId>,
    },
}

impl<'a> OutcomeJson<'a> {
    pub fn new(entry: Option<usize>, outcome: &'a Outcome) -> Self {
        match outcome {
            Ok(result) => OutcomeJson::Done {
                entry,
                failed: false,
                result,
            },
            Err(err) => OutcomeJson::Failed {
                entry,
                failed: true,
                changed: err.changed(),
                action: err.action(),
                error: error_chain(err),
                request_id: err.request_id(),
            },
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

pub fn print_result(label: Option<&str>, result: &ReconciliationResult) {
    let prefix = if result.check_mode { "[check] " } else { "" };
    let marker = if result.changed {
        "changed".yellow().bold()
    } else {
        "ok".green().bold()
    };
    let label = label.map(|l| format!("{l}: ")).unwrap_or_default();
    println!("{prefix}{marker} {label}{}", result.message);

    if let Some(id) = &result.request_id {
        match &result.final_status {
            Some(status) => println!("  request {id}  status {status}"),
            None => println!("  request {id}"),
        }
    }
}

pub fn print_failure(label: Option<&str>, err: &ReconcileError) {
    let label = label.map(|l| format!("{l}: ")).unwrap_or_default();
    println!("{} {label}{}", "failed".red().bold(), error_chain(err));
}

/// `err` and its sources joined with `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use certkeeper_core::RequestStatus;
    use certkeeper_daemon::DaemonError;

    fn result() -> ReconciliationResult {
        ReconciliationResult {
            changed: true,
            action: Action::Submitted,
            request_id: Some(RequestId::from("20261016000001")),
            final_status: Some(RequestStatus::Monitoring),
            check_mode: false,
            message: "request 20261016000001 submitted; certificate issued".into(),
        }
    }

    #[test]
    fn successful_outcome_flattens_result() {
        let outcome: Outcome = Ok(result());
        let value = serde_json::to_value(OutcomeJson::new(None, &outcome)).unwrap();
        assert_eq!(value["failed"], false);
        assert_eq!(value["changed"], true);
        assert_eq!(value["final_status"], "MONITORING");
        assert!(value.get("entry").is_none());
    }

    #[test]
    fn failed_outcome_carries_error_chain() {
        let outcome: Outcome = Err(ReconcileError::Daemon {
            operation: "list",
            request_id: None,
            action: Action::None,
            source: DaemonError::Protocol("garbled".into()),
        });
        let value = serde_json::to_value(OutcomeJson::new(Some(2), &outcome)).unwrap();
        assert_eq!(value["failed"], true);
        assert_eq!(value["changed"], false);
        assert_eq!(value["action"], "none");
        assert_eq!(value["entry"], 2);
        assert!(value["error"].as_str().unwrap().contains("garbled"));
        assert!(value.get("request_id").is_none());
    }

    #[test]
    fn timeout_after_submit_reports_the_change() {
        let outcome: Outcome = Err(ReconcileError::Timeout {
            request_id: RequestId::from("20261016000001"),
            last_status: Some(RequestStatus::CaWorking),
            waited: std::time::Duration::from_secs(120),
            action: Action::Submitted,
        });
        let value = serde_json::to_value(OutcomeJson::new(None, &outcome)).unwrap();
        assert_eq!(value["failed"], true);
        assert_eq!(value["changed"], true);
        assert_eq!(value["action"], "submitted");
        assert_eq!(value["request_id"], "20261016000001");
    }
}
