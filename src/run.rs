use crate::backend::Backend;
use crate::build::Builder;
use crate::events;
use crate::harness::FAILED_TEST_PATTERN;
use crate::{Request, Response};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, trace};

/// Program built by the health check.
pub const HEALTH_PROG: &str = r#"
package main

import "fmt"

func main() { fmt.Print("ok") }
"#;

/// The build-and-run pipeline behind the cache guard.
pub struct Playground {
    builder: Builder,
    backend: Backend,
}

impl Playground {
    pub fn new(builder: Builder, backend: Backend) -> Self {
        Self { builder, backend }
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Builds the program, runs it on the backend and decodes its output.
    ///
    /// Anything the user can fix is reported in [`Response::errors`]; an
    /// error means the service itself failed.
    #[tracing::instrument(
        level = "debug",
        err,
        skip(self, req),
        fields(nonce, with_vet = req.with_vet)
    )]
    pub async fn compile_and_run(&self, req: &Request) -> Result<Response> {
        let nonce: u32 = rand::random();
        tracing::Span::current().record("nonce", &nonce);

        trace!(body_len = req.body.len());

        let br = self
            .builder
            .build(req.body.as_bytes(), req.with_vet)
            .await
            .context("error building go source")?;

        if let Some(message) = br.error_message.clone() {
            debug!(%message, "build failed");
            br.release();
            return Ok(Response::error(message));
        }

        let exe_path = match br.exe_path.clone() {
            Some(path) => path,
            None => {
                br.release();
                return Err(anyhow!("build succeeded without a binary"));
            }
        };

        let exec = self.backend.run(&exe_path, br.test_param.as_deref()).await;
        let is_test = br.is_test();
        let vet_errors = br.vet_output.clone();
        br.release();

        let exec = exec.context("error running program")?;
        if !exec.error.is_empty() {
            info!(error = %exec.error, "program did not complete");
            return Ok(Response::error(exec.error));
        }

        let events = events::decode(&exec.stdout, &exec.stderr).context("error decoding events")?;

        let tests_failed = if is_test {
            events
                .iter()
                .map(|e| e.message.matches(FAILED_TEST_PATTERN).count())
                .sum()
        } else {
            0
        };

        debug!(status = exec.exit_code, events = events.len(), tests_failed);

        Ok(Response {
            errors: String::new(),
            events,
            status: exec.exit_code,
            is_test,
            tests_failed,
            vet_ok: req.with_vet && vet_errors.is_empty(),
            vet_errors,
        })
    }

    /// Runs vet alone and reports its findings as the response errors.
    #[tracing::instrument(level = "debug", err, skip(self, req), fields(nonce))]
    pub async fn vet_check(&self, req: &Request) -> Result<Response> {
        let nonce: u32 = rand::random();
        tracing::Span::current().record("nonce", &nonce);

        let out = self
            .builder
            .vet_program(req.body.as_bytes())
            .await
            .context("error running go vet")?;
        Ok(Response::error(out))
    }

    /// Builds a fixed program to prove the toolchain works.
    pub async fn health_check(&self) -> Result<()> {
        let br = self.builder.build(HEALTH_PROG.as_bytes(), false).await?;
        let message = br.error_message.clone();
        br.release();
        match message {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}
