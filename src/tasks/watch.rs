use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Configuration;

/// Editors often save in several steps; wait this long after the last event.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(250);

pub fn reload(path: &Path) -> Result<Configuration> {
    Configuration::from_yaml_file(path)
        .with_context(|| format!("failed to reload configuration from {}", path.display()))?
        .validated()
        .context("invalid configuration values")
}

/// Whether `event` may have changed the file named `file_name`.
fn touches(event: &Event, file_name: &OsStr) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
    );
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

/// Watch the configuration file and forward every valid revision. Invalid
/// revisions are logged and skipped; the gallery keeps its current tuning.
#[instrument(skip(to_viewer, cancel), fields(path = %path.display()))]
pub async fn run(
    path: PathBuf,
    to_viewer: Sender<Configuration>,
    cancel: CancellationToken,
) -> Result<()> {
    let file_name = path
        .file_name()
        .context("configuration path has no file name")?
        .to_owned();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(64);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    // The directory, not the file: editors replace files on save.
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(dir = %dir.display(), "watching configuration for changes");

    let mut deadline: Option<Instant> = None;
    loop {
        let wait = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("cancel received; exiting config watcher");
                break;
            }
            Some(res) = watch_rx.recv() => match res {
                Ok(event) if touches(&event, &file_name) => {
                    debug!(kind = ?event.kind, "configuration touched");
                    deadline = Some(Instant::now() + RELOAD_DEBOUNCE);
                }
                Ok(_) => {}
                Err(err) => error!("watch error: {err}"),
            },
            _ = wait => {
                deadline = None;
                match reload(&path) {
                    Ok(cfg) => {
                        info!("configuration reloaded");
                        if to_viewer.send(cfg).is_err() {
                            debug!("viewer gone; exiting config watcher");
                            break;
                        }
                    }
                    Err(err) => warn!(error = ?err, "ignoring configuration revision"),
                }
            }
        }
    }
    Ok(())
}
