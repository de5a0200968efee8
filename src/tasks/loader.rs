use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;
use tokio::select;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::LoaderOptions;
use crate::error::Error;
use crate::events::{DecodedImage, TextureOutcome, TextureRequest, TextureResult};

/// Bounded exponential backoff: retry `n` (1-based) waits `base * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_options(options: &LoaderOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            base_delay: options.retry_base_delay,
        }
    }

    pub fn delay_before(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Failure bookkeeping for one URL.
#[derive(Debug, Clone)]
pub struct LoadAttempts {
    policy: RetryPolicy,
    failures: u32,
}

impl LoadAttempts {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn on_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures > self.policy.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.policy.delay_before(self.failures))
        }
    }
}

/// Map a texture URL onto a local path. Plain paths and `file://` URLs resolve;
/// any other scheme is unsupported.
pub fn resolve_source(url: &str) -> Result<PathBuf, Error> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    match url.split_once("://") {
        Some(_) => Err(Error::UnsupportedSource(url.to_owned())),
        None if url.trim().is_empty() => Err(Error::UnsupportedSource(url.to_owned())),
        None => Ok(PathBuf::from(url)),
    }
}

/// Decode to RGBA8, shrinking so neither edge exceeds `max_dim`.
fn decode_rgba8(path: &Path, max_dim: u32) -> Result<DecodedImage, Error> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let img = if img.width() > max_dim || img.height() > max_dim {
        debug!(
            width = img.width(),
            height = img.height(),
            max_dim,
            "downscaling texture"
        );
        img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

async fn fetch(url: &str, max_dim: u32) -> Result<DecodedImage, Error> {
    let path = resolve_source(url)?;
    tokio::task::spawn_blocking(move || decode_rgba8(&path, max_dim))
        .await
        .map_err(|err| Error::Io(std::io::Error::other(err)))?
}

async fn load_with_retry(
    url: &str,
    policy: RetryPolicy,
    max_dim: u32,
    cancel: &CancellationToken,
) -> TextureOutcome {
    let mut attempts = LoadAttempts::new(policy);
    loop {
        let err = match fetch(url, max_dim).await {
            Ok(image) => {
                debug!(url, width = image.width, height = image.height, "texture decoded");
                return TextureOutcome::Loaded(Arc::new(image));
            }
            Err(err) => err,
        };
        if matches!(err, Error::UnsupportedSource(_)) {
            warn!(url, error = %err, "texture source cannot be loaded");
            return TextureOutcome::Failed;
        }
        match attempts.on_failure() {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    url,
                    attempt = attempts.failures(),
                    retry_in = %humantime::format_duration(delay),
                    error = %err,
                    "texture load failed; retrying"
                );
                select! {
                    _ = cancel.cancelled() => return TextureOutcome::Failed,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::GiveUp => {
                warn!(
                    url,
                    attempts = attempts.failures(),
                    error = %err,
                    "texture load failed; giving up"
                );
                return TextureOutcome::Failed;
            }
        }
    }
}

/// Load every requested texture with at most `max_concurrent` in flight and
/// forward each outcome to the render thread. Returns once all requests are
/// answered, the receiver is gone, or `cancel` fires.
#[instrument(skip_all, fields(requests = requests.len()))]
pub async fn run(
    requests: Vec<TextureRequest>,
    to_viewer: Sender<TextureResult>,
    cancel: CancellationToken,
    options: LoaderOptions,
) -> Result<()> {
    let policy = RetryPolicy::from_options(&options);
    let mut queue: VecDeque<TextureRequest> = requests.into();
    let mut tasks: JoinSet<TextureResult> = JoinSet::new();
    let mut in_flight: HashMap<Id, TextureRequest> = HashMap::new();
    let total = queue.len();
    let mut delivered = 0usize;

    loop {
        while tasks.len() < options.max_concurrent {
            let Some(request) = queue.pop_front() else {
                break;
            };
            let cancel = cancel.clone();
            let max_dim = options.max_texture_dim;
            let job = request.clone();
            let handle = tasks.spawn(async move {
                let outcome = load_with_retry(&job.url, policy, max_dim, &cancel).await;
                TextureResult {
                    url: job.url,
                    generation: job.generation,
                    outcome,
                }
            });
            in_flight.insert(handle.id(), request);
        }
        if tasks.is_empty() {
            break;
        }

        select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                break;
            },
            Some(joined) = tasks.join_next_with_id() => {
                let Some(result) = settle(joined, &mut in_flight) else {
                    continue;
                };
                if to_viewer.send(result).is_err() {
                    debug!("viewer gone; stopping loader");
                    tasks.abort_all();
                    break;
                }
                delivered += 1;
            }
        }
    }

    info!(delivered, total, "texture loader finished");
    Ok(())
}

/// Turn a finished task into the result the gallery sees. A task that died
/// without answering reports its URL as failed so the card falls back to the
/// placeholder.
fn settle(
    joined: Result<(Id, TextureResult), JoinError>,
    in_flight: &mut HashMap<Id, TextureRequest>,
) -> Option<TextureResult> {
    match joined {
        Ok((id, result)) => {
            in_flight.remove(&id);
            Some(result)
        }
        Err(err) => {
            let request = in_flight.remove(&err.id())?;
            warn!(url = %request.url, error = %err, "texture task died");
            Some(TextureResult {
                url: request.url,
                generation: request.generation,
                outcome: TextureOutcome::Failed,
            })
        }
    }
}
