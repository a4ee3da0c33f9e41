use crate::build::Builder;
use crate::utils::{strip_dir_prefix, strip_vet_banner};
use crate::VET_TIMEOUT_ERROR;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Runs `go vet` on the module materialized in `dir`.
///
/// Returns the empty string when vet is happy, the user-facing report
/// otherwise. Only a failure to start the tool is an error.
#[tracing::instrument(level = "debug", err, skip(builder))]
pub async fn vet_in_dir(builder: &Builder, dir: &Path, gopath: &Path) -> Result<String> {
    let mut cmd = builder.go_command(dir, gopath);
    cmd.arg("vet")
        .arg(format!("-tags={}", builder.settings().build_tags))
        .arg("-modcacherw")
        .arg("-mod=mod")
        .arg(".");

    let out = builder.run(cmd).await.context("error starting go vet")?;
    debug!(termination = ?out.termination, status = ?out.status, "go vet finished");

    if out.timed_out() {
        info!("go vet timed out");
        return Ok(VET_TIMEOUT_ERROR.to_owned());
    }
    if out.success() {
        return Ok(String::new());
    }

    let text = String::from_utf8_lossy(&out.output);
    let text = strip_dir_prefix(&text, dir);
    Ok(strip_vet_banner(&text).to_owned())
}
