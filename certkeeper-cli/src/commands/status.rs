//! `certkeeper status`: one tracked request in detail.

use anyhow::{Context, Result};
use clap::Args;

use certkeeper_core::{RequestId, TrackedRequest};
use certkeeper_daemon::{DaemonClient, SocketClient};

use super::list::{expiry_label, status_label};
use super::report;
use super::{block_on, resolve_settings, GlobalOpts};

/// Arguments for `certkeeper status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Request id as shown by `certkeeper list`.
    pub id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let settings = resolve_settings(global, None, None)?;
        let client = SocketClient::from_settings(&settings);
        let id = RequestId::from(self.id);
        let request = block_on(client.get_request(&id))?
            .with_context(|| format!("failed to read request {id}"))?;

        if self.json {
            return report::print_json(&request);
        }
        print_request(&request);
        Ok(())
    }
}

fn print_request(request: &TrackedRequest) {
    println!("Request {}", request.id);
    println!("  status:     {}", status_label(&request.status));
    println!("  storage:    {}", request.storage);
    println!("  ca:         {}", request.authority);
    if let Some(subject) = &request.subject {
        println!("  subject:    {subject}");
    }
    if let Some(principal) = &request.principal {
        println!("  principal:  {principal}");
    }
    println!(
        "  expires:    {}",
        expiry_label(request.expires_at, request.auto_renew)
    );
    if let Some(error) = &request.last_error {
        println!("  last error: {error}");
    }
}
