//! Cache lookup and cacheability check around the build-and-run pipeline.

use crate::cache::{cache_key, ResponseCache};
use crate::{Response, BUILD_TIMEOUT_ERROR, RUN_TIMEOUT_ERROR, VET_TIMEOUT_ERROR};

use std::future::Future;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Text that only shows up when the machine itself is in trouble.
pub const RESOURCE_EXHAUSTION_ERRORS: &[&str] = &["out of memory", "cannot allocate memory"];

const TIMEOUT_ERRORS: &[&str] = &[BUILD_TIMEOUT_ERROR, RUN_TIMEOUT_ERROR, VET_TIMEOUT_ERROR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Compile,
    CompileWithVet,
    Vet,
}

impl Operation {
    pub fn compile(with_vet: bool) -> Self {
        if with_vet {
            Operation::CompileWithVet
        } else {
            Operation::Compile
        }
    }

    /// Namespace of the operation in the cache key.
    pub fn prefix(self) -> &'static str {
        match self {
            Operation::Compile => "prog",
            Operation::CompileWithVet => "prog_vet",
            Operation::Vet => "vet",
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("pipeline failed: {0:#}")]
    Pipeline(anyhow::Error),

    #[error("resource exhaustion in output: {0:?}")]
    ResourceExhausted(String),
}

/// Where a guarded response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Replayed from the cache, the pipeline did not run.
    Hit,
    /// Computed and written to the cache.
    Stored,
    /// Computed but not deterministic enough to be stored.
    Bypassed,
}

/// Answers `body` from the cache, or runs `pipeline` and stores its result
/// when it is deterministic.
///
/// Timeouts are returned to the caller but never stored. Resource
/// exhaustion is reported as an error and never stored.
#[tracing::instrument(
    level = "debug",
    skip(cache, body, pipeline),
    fields(op = operation.prefix())
)]
pub async fn guarded<F, Fut>(
    cache: &dyn ResponseCache,
    operation: Operation,
    version: &str,
    body: &str,
    pipeline: F,
) -> Result<(Response, CacheStatus), GuardError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Response>>,
{
    let key = cache_key(operation.prefix(), version, body);

    match cache.get(&key).await {
        Ok(Some(resp)) => {
            debug!(%key, "cache hit");
            return Ok((resp, CacheStatus::Hit));
        }
        Ok(None) => debug!(%key, "cache miss"),
        Err(err) => warn!(%key, ?err, "cache get failed"),
    }

    let resp = pipeline().await.map_err(|err| {
        error!(?err, "pipeline failed");
        GuardError::Pipeline(err)
    })?;

    if is_timeout(&resp) {
        debug!(errors = %resp.errors, "timed out, not caching");
        return Ok((resp, CacheStatus::Bypassed));
    }

    if let Some(text) = resource_exhaustion(&resp) {
        error!(%text, "resource exhaustion in response");
        return Err(GuardError::ResourceExhausted(text.to_owned()));
    }

    if let Err(err) = cache.set(&key, &resp).await {
        error!(%key, ?err, "cache set failed");
    }
    Ok((resp, CacheStatus::Stored))
}

fn is_timeout(resp: &Response) -> bool {
    TIMEOUT_ERRORS
        .iter()
        .any(|t| resp.errors.contains(t) || resp.vet_errors.contains(t))
}

/// The first piece of output that mentions resource exhaustion.
fn resource_exhaustion(resp: &Response) -> Option<&str> {
    let contains_poison = |s: &str| RESOURCE_EXHAUSTION_ERRORS.iter().any(|e| s.contains(e));

    if contains_poison(&resp.errors) {
        return Some(&resp.errors);
    }
    resp.events
        .iter()
        .map(|ev| ev.message.as_str())
        .find(|msg| contains_poison(msg))
}
