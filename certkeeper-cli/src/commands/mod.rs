pub mod apply;
pub mod ensure;
pub mod list;
pub mod status;

mod report;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use certkeeper_core::{config, Settings, SettingsOverrides};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub socket: Option<PathBuf>,
}

/// Timing flags for commands that may wait on issuance.
#[derive(Args, Debug, Clone, Default)]
pub struct WaitFlags {
    /// Give up waiting for issuance after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub wait_timeout: Option<u64>,

    /// Delay between status polls while waiting, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,
}

impl WaitFlags {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            wait_timeout_secs: self.wait_timeout,
            poll_interval_ms: self.poll_interval,
            ..Default::default()
        }
    }
}

/// Effective settings: defaults, `~/.certkeeper/config.yaml`,
/// `CERTKEEPER_SOCKET`, the manifest's `settings:` block, then flags.
pub fn resolve_settings(
    global: &GlobalOpts,
    manifest: Option<&SettingsOverrides>,
    wait: Option<&WaitFlags>,
) -> Result<Settings> {
    let mut settings = config::load_settings()
        .context("failed to load ~/.certkeeper/config.yaml")?;
    settings.apply_env();
    if let Some(overrides) = manifest {
        settings.apply(overrides);
    }
    if let Some(flags) = wait {
        settings.apply(&flags.overrides());
    }
    if let Some(socket) = &global.socket {
        settings.socket = socket.clone();
    }
    tracing::debug!(
        socket = %settings.socket.display(),
        wait_timeout = ?settings.wait_timeout,
        poll_interval = ?settings.poll_interval,
        "resolved settings"
    );
    Ok(settings)
}

/// Run `future` to completion on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
