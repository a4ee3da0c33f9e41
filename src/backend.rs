use crate::RUN_TIMEOUT_ERROR;

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::{fs, time};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";
pub const ARGUMENT_HEADER: &str = "X-Argument";

/// Wait before the n-th retry is n times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// What the sandbox backend reports about one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "exitCode", alias = "exit_code", default)]
    pub exit_code: i32,

    #[serde(default, with = "base64_bytes")]
    pub stdout: Vec<u8>,

    #[serde(default, with = "base64_bytes")]
    pub stderr: Vec<u8>,

    /// Set by the backend when the program could not be run to completion,
    /// or by us when the run deadline passed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExecutionResult {
    pub fn timeout() -> Self {
        Self {
            error: RUN_TIMEOUT_ERROR.to_owned(),
            ..Default::default()
        }
    }
}

/// Client of the remote sandbox that executes built binaries.
#[derive(Debug, Clone)]
pub struct Backend {
    client: Client,
    url: String,
    timeout: Duration,
    retries: u32,
}

impl Backend {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration, retries: u32) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            retries,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the binary at `exe_path` to the backend and waits for it to
    /// run.
    ///
    /// Passing the run deadline is not an error; it yields a result whose
    /// `error` is the run timeout message.
    #[tracing::instrument(level = "debug", err, skip(self), fields(url = %self.url))]
    pub async fn run(&self, exe_path: &Path, test_param: Option<&str>) -> Result<ExecutionResult> {
        let exe = fs::read(exe_path)
            .await
            .with_context(|| format!("failed to read binary {}", exe_path.display()))?;

        let key = Uuid::new_v4().to_string();
        debug!(size = exe.len(), %key, ?test_param, "posting binary");

        match time::timeout(self.timeout, self.post(exe, &key, test_param)).await {
            Ok(result) => result,
            Err(_) => {
                info!(timeout = ?self.timeout, "program run timed out");
                Ok(ExecutionResult::timeout())
            }
        }
    }

    async fn post(
        &self,
        exe: Vec<u8>,
        key: &str,
        test_param: Option<&str>,
    ) -> Result<ExecutionResult> {
        let mut attempt = 0;
        let res = loop {
            let mut req = self
                .client
                .post(&self.url)
                .header(IDEMPOTENCY_KEY, key)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(exe.clone());
            if let Some(arg) = test_param {
                req = req.header(ARGUMENT_HEADER, arg);
            }

            match req.send().await {
                Ok(res) => break res,
                Err(err) if err.is_connect() && attempt < self.retries => {
                    attempt += 1;
                    warn!(%err, attempt, "backend unreachable, retrying");
                    time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => return Err(err).with_context(|| format!("POST {:?}", self.url)),
            }
        };

        let status = res.status();
        if status != StatusCode::OK {
            error!(%status, "unexpected response from backend");
            return Err(anyhow!("unexpected response from backend: {}", status));
        }

        let body = res.bytes().await.context("failed to read backend response")?;
        serde_json::from_slice(&body).map_err(|err| {
            error!(%err, "JSON decode error from backend");
            anyhow!("error parsing JSON from backend")
        })
    }
}

/// Byte fields travel as base64 strings. A missing or null field is empty.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => BASE64.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
