#![allow(dead_code)]

use goplay::build::{BuildSettings, Builder};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use tempfile::TempDir;

fn setup_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::fmt()
        .event_format(fmt::format::Format::default().pretty())
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_test_writer()
        .finish()
        .with(ErrorLayer::default())
        .init();
}

pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        setup_tracing();
    });
}

pub const GO_VERSION: &str = "go1.22.1";

/// `go build` writes a tiny binary.
pub const BUILD_OK: &str = r#"printf 'ELF' > "$3""#;

/// `go vet` finds nothing.
pub const VET_OK: &str = "exit 0";

/// A stand-in for the go command, driven by a shell script.
///
/// Every invocation records its arguments and environment in the log
/// directory, and keeps a copy of `prog.go` when there is one.
pub struct FakeGo {
    dir: TempDir,
    pub bin: PathBuf,
}

impl FakeGo {
    pub fn new(build: &str, vet: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log");
        fs::create_dir(&log).unwrap();

        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}/args"
env > "{log}/env"
[ -f prog.go ] && cp prog.go "{log}/prog.go"
case "$1" in
env)
    echo {version}
    ;;
build)
    {build}
    ;;
vet)
    {vet}
    ;;
esac
"#,
            log = log.display(),
            version = GO_VERSION,
            build = build,
            vet = vet,
        );

        let bin = dir.path().join("go");
        fs::write(&bin, script).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, bin }
    }

    pub fn ok() -> Self {
        Self::new(BUILD_OK, VET_OK)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("log")
    }

    pub fn logged(&self, name: &str) -> String {
        fs::read_to_string(self.log_dir().join(name)).unwrap_or_default()
    }

    pub fn settings(&self, timeout: Duration) -> BuildSettings {
        BuildSettings {
            go_bin: self.bin.clone(),
            goroot: None,
            goproxy: "https://proxy.golang.org".into(),
            build_tags: "faketime".into(),
            timeout,
            interrupt_grace: Duration::from_millis(100),
        }
    }

    pub fn builder(&self) -> Builder {
        Builder::new(self.settings(Duration::from_secs(5)))
    }
}

pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map_or(true, |mut it| it.next().is_none())
}
