//! `certkeeper ensure`: reconcile one certificate slot described by flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use certkeeper_core::{CertRequestSpec, DesiredCertRequest, TargetState};
use certkeeper_daemon::SocketClient;
use certkeeper_reconcile::{Reconciler, WaitSettings};

use super::report::{self, OutcomeJson};
use super::{block_on, resolve_settings, GlobalOpts, WaitFlags};

/// Arguments for `certkeeper ensure`.
#[derive(Args, Debug)]
pub struct EnsureArgs {
    /// Private key file.
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Certificate file.
    #[arg(long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// NSS database directory.
    #[arg(long, value_name = "DIR")]
    pub nss_db: Option<PathBuf>,

    /// Certificate nickname inside the NSS database.
    #[arg(long, value_name = "NAME")]
    pub nss_nickname: Option<String>,

    /// NSS token holding the key.
    #[arg(long, value_name = "TOKEN")]
    pub nss_token: Option<String>,

    /// PIN protecting the key.
    #[arg(long, conflicts_with = "password_file")]
    pub password: Option<String>,

    /// File containing the key PIN.
    #[arg(long, value_name = "PATH")]
    pub password_file: Option<PathBuf>,

    /// Certificate authority nickname known to the daemon.
    #[arg(long)]
    pub ca: Option<String>,

    /// Nickname for the tracking request.
    #[arg(long)]
    pub nickname: Option<String>,

    /// Subject DN (defaults to CN=<hostname>).
    #[arg(long)]
    pub subject: Option<String>,

    /// Kerberos principal; required with `--ca IPA`.
    #[arg(long)]
    pub principal: Option<String>,

    /// Do not renew automatically before expiry.
    #[arg(long)]
    pub no_renew: bool,

    /// Return after submitting instead of waiting for issuance.
    #[arg(long)]
    pub no_wait: bool,

    /// Desired state: present, absent or resubmitted.
    #[arg(long, default_value_t = TargetState::Present)]
    pub state: TargetState,

    /// Report what would change without touching the daemon.
    #[arg(long)]
    pub check: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub wait: WaitFlags,
}

impl EnsureArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let (check, json) = (self.check, self.json);
        let settings = resolve_settings(global, None, Some(&self.wait))?;
        let desired = DesiredCertRequest::try_from(self.into_spec())
            .context("invalid certificate request")?;

        let client = SocketClient::from_settings(&settings);
        let reconciler = Reconciler::new(&client, WaitSettings::from(&settings)).check_mode(check);
        let outcome = block_on(reconciler.reconcile(&desired))?;

        if json {
            report::print_json(&OutcomeJson::new(None, &outcome))?;
        } else if let Ok(result) = &outcome {
            report::print_result(None, result);
        }

        outcome
            .map(|_| ())
            .with_context(|| format!("failed to reconcile {}", desired.storage()))
    }

    fn into_spec(self) -> CertRequestSpec {
        CertRequestSpec {
            key: self.key,
            cert: self.cert,
            nss_db: self.nss_db,
            nss_nickname: self.nss_nickname,
            nss_token: self.nss_token,
            password: self.password,
            password_file: self.password_file,
            ca: self.ca,
            nickname: self.nickname,
            subject: self.subject,
            principal: self.principal,
            renew: self.no_renew.then_some(false),
            wait: self.no_wait.then_some(false),
            state: Some(self.state),
        }
    }
}
