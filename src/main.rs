use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use content_model::ContentSnapshot;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rust_coverflow::config::Configuration;
use rust_coverflow::events::TextureRequest;
use rust_coverflow::render::viewer::{self, ViewerLinks};
use rust_coverflow::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "coverflow",
    version,
    about = "infinite coverflow gallery with momentum scrolling"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Content manifest (YAML or JSON); overrides `content-path` from the config
    #[arg(long, value_name = "MANIFEST")]
    content: Option<PathBuf>,
    /// Skip the intro animation
    #[arg(long = "no-intro")]
    no_intro: bool,
    /// Do not reload tuning when the config file changes
    #[arg(long = "no-watch")]
    no_watch: bool,
}

fn manifest_path(
    config_path: &Path,
    cfg: &Configuration,
    flag: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    let Some(path) = cfg.content_path.as_ref() else {
        bail!("no content manifest: pass --content or set content-path in the config");
    };
    if path.is_absolute() {
        return Ok(path.clone());
    }
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        content,
        no_intro,
        no_watch,
    } = Args::parse();

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if no_intro {
        cfg.intro.enabled = false;
    }
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let manifest = manifest_path(&config, &cfg, content)?;
    let snapshot = ContentSnapshot::from_file(&manifest)
        .with_context(|| format!("failed to load content from {}", manifest.display()))?;
    tracing::info!(
        manifest = %manifest.display(),
        records = snapshot.len(),
        "content loaded"
    );
    let snapshot = Arc::new(snapshot);

    let (requests_tx, requests_rx) = oneshot::channel::<Vec<TextureRequest>>();
    let (loaded_tx, loaded_rx) = crossbeam_channel::unbounded();
    let (tuning_tx, tuning_rx) = crossbeam_channel::unbounded();

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Texture loader, started once the gallery knows what it needs
    tasks.spawn({
        let cancel = cancel.clone();
        let options = cfg.loader.clone();
        async move {
            let requests = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                requests = requests_rx => match requests {
                    Ok(requests) => requests,
                    Err(_) => return Ok(()),
                },
            };
            tasks::loader::run(requests, loaded_tx, cancel, options)
                .await
                .context("loader task failed")
        }
    });

    // Config watcher
    if no_watch {
        drop(tuning_tx);
    } else {
        tasks.spawn({
            let cancel = cancel.clone();
            let path = config.clone();
            async move {
                tasks::watch::run(path, tuning_tx, cancel)
                    .await
                    .context("config watcher failed")
            }
        });
    }

    // Run the windowed viewer on the main thread (blocking) after spawning other tasks
    let links = ViewerLinks {
        to_loader: requests_tx,
        from_loader: loaded_rx,
        from_watcher: tuning_rx,
    };
    if let Err(e) = viewer::run_windowed(cfg, snapshot, cancel.clone(), links)
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    // Ensure other tasks are asked to stop
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
