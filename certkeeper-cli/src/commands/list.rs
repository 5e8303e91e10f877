//! `certkeeper list`: every request the daemon tracks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use certkeeper_core::{Phase, RequestStatus, TrackedRequest};
use certkeeper_daemon::{DaemonClient, SocketClient};

use super::report;
use super::{block_on, resolve_settings, GlobalOpts};

/// Arguments for `certkeeper list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "storage")]
    storage: String,
    #[tabled(rename = "ca")]
    authority: String,
    #[tabled(rename = "subject")]
    subject: String,
    #[tabled(rename = "expires")]
    expires: String,
}

impl ListArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let settings = resolve_settings(global, None, None)?;
        let client = SocketClient::from_settings(&settings);
        let requests = block_on(client.list_requests())?
            .context("failed to list tracked requests")?;

        if self.json {
            return report::print_json(&requests);
        }

        if requests.is_empty() {
            println!("The daemon is not tracking any requests.");
            return Ok(());
        }

        let issued = requests
            .iter()
            .filter(|r| r.status.phase() == Phase::Issued)
            .count();
        let failed = requests
            .iter()
            .filter(|r| r.status.phase() == Phase::Failed)
            .count();
        println!(
            "{} tracked | {} issued | {} failed",
            requests.len(),
            issued,
            failed
        );

        let rows: Vec<RequestRow> = requests.iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn row(request: &TrackedRequest) -> RequestRow {
    RequestRow {
        id: request.id.to_string(),
        status: status_label(&request.status),
        storage: request.storage.to_string(),
        authority: request.authority.clone(),
        subject: request.subject.clone().unwrap_or_else(|| "-".to_string()),
        expires: expiry_label(request.expires_at, request.auto_renew),
    }
}

pub(super) fn status_label(status: &RequestStatus) -> String {
    let text = status.to_string();
    match status.phase() {
        Phase::Issued => text.green().bold().to_string(),
        Phase::Failed => text.red().bold().to_string(),
        Phase::InProgress => text.yellow().to_string(),
    }
}

pub(super) fn expiry_label(expires_at: Option<DateTime<Utc>>, auto_renew: bool) -> String {
    let Some(at) = expires_at else {
        return "-".to_string();
    };
    let date = at.format("%Y-%m-%d").to_string();
    if auto_renew {
        date
    } else {
        format!("{date} (no renew)")
    }
}
