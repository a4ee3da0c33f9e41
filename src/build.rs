use crate::files::{split_files, FileSet};
use crate::harness::{self, TEST_PARAM};
use crate::proc::{run_with_deadline, ProcOutput};
use crate::utils::{strip_build_banner, strip_dir_prefix};
use crate::vet;
use crate::{PlayConfig, BUILD_TIMEOUT_ERROR, PROG_NAME};

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use tempfile::TempDir;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

/// Binaries above this size are rejected before they reach the backend.
pub const MAX_BINARY_SIZE: u64 = 100 << 20;

const EXE_NAME: &str = "a.out";

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub go_bin: PathBuf,
    pub goroot: Option<PathBuf>,
    pub goproxy: String,
    pub build_tags: String,
    pub timeout: Duration,
    pub interrupt_grace: Duration,
}

impl BuildSettings {
    pub fn from_config(config: &PlayConfig) -> Self {
        Self {
            go_bin: config.go_bin.clone(),
            goroot: config.goroot.clone().filter(|p| !p.as_os_str().is_empty()),
            goproxy: config.goproxy.clone(),
            build_tags: config.build_tags.clone(),
            timeout: config.build_timeout(),
            interrupt_grace: config.interrupt_grace(),
        }
    }
}

/// Outcome of a build attempt.
///
/// Owns the scratch directory holding the sources and the binary. The
/// directory is removed when the result is released or dropped.
#[derive(Debug)]
pub struct BuildResult {
    dir: TempDir,
    /// Path to the built binary, set only on success.
    pub exe_path: Option<PathBuf>,
    /// Argument for the binary when it runs a synthesized test harness.
    pub test_param: Option<String>,
    /// Message for the user when the program could not be built.
    pub error_message: Option<String>,
    /// Output of go vet, if requested. Empty when vet passed.
    pub vet_output: String,
}

impl BuildResult {
    fn new(dir: TempDir) -> Self {
        Self {
            dir,
            exe_path: None,
            test_param: None,
            error_message: None,
            vet_output: String::new(),
        }
    }

    fn failed(mut self, message: impl Into<String>) -> Self {
        self.exe_path = None;
        self.error_message = Some(message.into());
        self
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn is_test(&self) -> bool {
        self.test_param.is_some()
    }

    /// Removes the scratch directory.
    pub fn release(self) {
        remove_dir(self.dir);
    }
}

pub(crate) fn remove_dir(dir: TempDir) {
    let path = dir.path().to_owned();
    if let Err(err) = dir.close() {
        warn!(path = ?path, %err, "failed to remove scratch dir");
    }
}

pub(crate) fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("error creating temp directory")
}

pub struct Builder {
    settings: BuildSettings,
}

impl Builder {
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Builds a program and returns a build result that owns the build
    /// directory.
    ///
    /// An error is returned only if a non-user-correctable error occurred.
    #[tracing::instrument(level = "debug", err, skip(self, src))]
    pub async fn build(&self, src: &[u8], vet: bool) -> Result<BuildResult> {
        let t0 = Instant::now();
        let mut br = BuildResult::new(scratch_dir("sandbox")?);

        let mut files = match split_files(src) {
            Ok(files) => files,
            Err(err) => return Ok(br.failed(err.to_string())),
        };

        let mut build_target = ".";
        if files.single_entry().is_some() {
            build_target = PROG_NAME;
            let test_code = files.single_entry().and_then(harness::test_program);
            if let Some(code) = test_code {
                br.test_param = Some(TEST_PARAM.to_owned());
                files.add_file(PROG_NAME, code);
            }
        }
        files.ensure_go_mod();

        if let Err(err) = files.check_main_package() {
            return Ok(br.failed(err.to_string()));
        }

        debug!(
            files = files.len(),
            no_header = files.no_header(),
            build_target,
            is_test = br.is_test(),
            "materializing program"
        );
        materialize(br.dir(), &files).await?;

        let exe_path = br.dir().join(EXE_NAME);
        let gopath = scratch_dir("gopath-")?;

        let mut cmd = self.go_command(br.dir(), gopath.path());
        cmd.arg("build")
            .arg("-o")
            .arg(&exe_path)
            .arg(format!("-tags={}", self.settings.build_tags))
            .arg("-modcacherw")
            .arg("-mod=mod")
            .arg(build_target);

        let out = self.run(cmd).await.context("error starting go build")?;
        debug!(elapsed = ?t0.elapsed(), termination = ?out.termination, "go build finished");

        if !out.success() {
            let message = self.compile_errors(br.dir(), &out);
            remove_dir(gopath);
            return Ok(br.failed(message));
        }

        let size = fs::metadata(&exe_path)
            .await
            .context("failed to stat binary")?
            .len();
        if size == 0 {
            remove_dir(gopath);
            bail!("invalid binary size {}", size);
        }
        if size > MAX_BINARY_SIZE {
            remove_dir(gopath);
            return Ok(br.failed(format!(
                "binary too large ({} bytes exceeds limit of {})",
                size, MAX_BINARY_SIZE
            )));
        }
        br.exe_path = Some(exe_path);

        if vet {
            let result = vet::vet_in_dir(self, br.dir(), gopath.path()).await;
            remove_dir(gopath);
            br.vet_output = result.context("running vet")?;
        } else {
            remove_dir(gopath);
        }

        Ok(br)
    }

    /// Runs go vet on a program without building it.
    #[tracing::instrument(level = "debug", err, skip(self, src))]
    pub async fn vet_program(&self, src: &[u8]) -> Result<String> {
        let dir = scratch_dir("vet")?;

        let mut files = match split_files(src) {
            Ok(files) => files,
            Err(err) => {
                remove_dir(dir);
                return Ok(err.to_string());
            }
        };
        files.ensure_go_mod();

        let result = async {
            materialize(dir.path(), &files).await?;
            let gopath = scratch_dir("gopath-")?;
            let result = vet::vet_in_dir(self, dir.path(), gopath.path()).await;
            remove_dir(gopath);
            result
        }
        .await;

        remove_dir(dir);
        result
    }

    /// Version string of the compiler toolchain, as in `go1.22.1`.
    pub async fn toolchain_version(&self) -> Result<String> {
        let dir = scratch_dir("goversion")?;
        let mut cmd = self.go_command(dir.path(), dir.path());
        cmd.arg("env").arg("GOVERSION");
        let out = self.run(cmd).await;
        remove_dir(dir);

        let out = out.context("error starting go env")?;
        let text = String::from_utf8_lossy(&out.output);
        if !out.success() {
            bail!("go env GOVERSION failed: {}", text.trim());
        }
        match text.trim() {
            "" => Err(anyhow!("go env GOVERSION printed nothing")),
            version => Ok(version.to_owned()),
        }
    }

    pub(crate) async fn run(&self, cmd: Command) -> Result<ProcOutput> {
        run_with_deadline(cmd, self.settings.timeout, self.settings.interrupt_grace).await
    }

    /// A go command with an explicit environment: fixed target, no cgo, a
    /// private build cache and module path, and the playground's proxy.
    pub(crate) fn go_command(&self, dir: &Path, gopath: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.go_bin);
        cmd.current_dir(dir).env_clear();
        for (k, v) in self.go_env(dir, gopath) {
            cmd.env(k, v);
        }
        cmd
    }

    fn go_env(&self, dir: &Path, gopath: &Path) -> Vec<(&'static str, OsString)> {
        let mut env: Vec<(&'static str, OsString)> = vec![
            ("GOOS", "linux".into()),
            ("GOARCH", "amd64".into()),
            ("GOCACHE", dir.join("gocache").into_os_string()),
            ("CGO_ENABLED", "0".into()),
            ("PATH", env::var_os("PATH").unwrap_or_default()),
        ];
        if let Some(ref goroot) = self.settings.goroot {
            env.push(("GOROOT", goroot.clone().into_os_string()));
        }

        let private = ["GOPRIVATE", "GONOPROXY", "GONOSUMDB"];
        if private
            .iter()
            .any(|k| env::var_os(k).is_some_and(|v| !v.is_empty()))
        {
            for k in private {
                env.push((k, env::var_os(k).unwrap_or_default()));
            }
        }

        env.push(("GO111MODULE", "on".into()));
        env.push(("GOPROXY", self.settings.goproxy.clone().into()));
        env.push(("GOPATH", gopath.as_os_str().to_owned()));

        trace!(?env);
        env
    }

    /// Compiler output rewritten for the user.
    fn compile_errors(&self, dir: &Path, out: &ProcOutput) -> String {
        let text = String::from_utf8_lossy(&out.output);
        let text = strip_build_banner(&strip_dir_prefix(&text, dir));
        if out.timed_out() {
            info!(termination = ?out.termination, "go build timed out");
            format!("{}\n{}", BUILD_TIMEOUT_ERROR, text)
        } else {
            text
        }
    }
}

/// Writes every file under `dir`, creating subdirectories as needed.
async fn materialize(dir: &Path, files: &FileSet) -> Result<()> {
    for (name, data) in files.iter() {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            if parent != dir {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("error creating directory {}", parent.display()))?;
            }
        }
        fs::write(&path, data)
            .await
            .with_context(|| format!("error creating temp file {}", path.display()))?;
    }
    Ok(())
}
