//! `certkeeper apply`: reconcile every entry of a YAML manifest in order.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use certkeeper_core::{config, DesiredCertRequest};
use certkeeper_daemon::SocketClient;
use certkeeper_reconcile::{Reconciler, WaitSettings};

use super::report::{self, OutcomeJson};
use super::{block_on, resolve_settings, GlobalOpts, WaitFlags};

/// Arguments for `certkeeper apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Manifest listing the desired certificates.
    pub manifest: PathBuf,

    /// Report what would change without touching the daemon.
    #[arg(long)]
    pub check: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub wait: WaitFlags,
}

impl ApplyArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let manifest = config::load_manifest(&self.manifest)
            .with_context(|| format!("failed to load manifest {}", self.manifest.display()))?;
        let settings = resolve_settings(global, manifest.settings.as_ref(), Some(&self.wait))?;

        if manifest.certificates.is_empty() {
            if self.json {
                report::print_json::<[OutcomeJson]>(&[])?;
            } else {
                println!("No certificates listed in {}.", self.manifest.display());
            }
            return Ok(());
        }

        let labels: Vec<String> = manifest
            .certificates
            .iter()
            .enumerate()
            .map(|(index, spec)| match &spec.nickname {
                Some(nickname) => format!("#{} {nickname}", index + 1),
                None => format!("#{}", index + 1),
            })
            .collect();
        let desired = manifest
            .certificates
            .into_iter()
            .map(DesiredCertRequest::try_from);

        let client = SocketClient::from_settings(&settings);
        let reconciler =
            Reconciler::new(&client, WaitSettings::from(&settings)).check_mode(self.check);
        let outcomes = block_on(reconciler.reconcile_all(desired))?;

        if self.json {
            let payload: Vec<OutcomeJson> = outcomes
                .iter()
                .enumerate()
                .map(|(index, outcome)| OutcomeJson::new(Some(index + 1), outcome))
                .collect();
            report::print_json(&payload)?;
        } else {
            for (label, outcome) in labels.iter().zip(&outcomes) {
                match outcome {
                    Ok(result) => report::print_result(Some(label.as_str()), result),
                    Err(err) => report::print_failure(Some(label.as_str()), err),
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            bail!(
                "{failed} of {} certificate(s) in {} failed",
                outcomes.len(),
                self.manifest.display()
            );
        }
        Ok(())
    }
}
