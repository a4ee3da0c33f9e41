#![deny(clippy::all)]

pub mod backend;
pub mod build;
pub mod cache;
pub mod events;
pub mod files;
pub mod gosrc;
pub mod guard;
pub mod harness;
pub mod proc;
pub mod run;
pub mod server;
pub mod txtar;
pub mod vet;

mod signal;
mod utils;

pub use crate::backend::{Backend, ExecutionResult};
pub use crate::build::{BuildResult, Builder};
pub use crate::cache::{MemoryCache, NoopCache, ResponseCache};
pub use crate::events::Event;
pub use crate::guard::{GuardError, Operation};
pub use crate::run::Playground;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Implicit name of the entry file, used in compiler and vet errors.
pub const PROG_NAME: &str = "prog.go";

pub const BUILD_TIMEOUT_ERROR: &str = "timeout running go build";
pub const RUN_TIMEOUT_ERROR: &str = "timeout running program";
pub const VET_TIMEOUT_ERROR: &str = "timeout running go vet";

#[derive(Debug, Clone, Parser)]
#[command(name = "goplay", version, about = "Go playground build-and-run backend")]
pub struct PlayConfig {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// URL of the sandbox backend that executes built binaries.
    #[arg(long, env = "SANDBOX_BACKEND_URL", value_name = "url")]
    pub backend_url: String,

    #[arg(long, env = "PLAY_GOPROXY", default_value = "https://proxy.golang.org")]
    pub goproxy: String,

    #[arg(
        long,
        env = "PLAY_GO_BIN",
        value_name = "path",
        default_value = "/usr/local/go-faketime/bin/go"
    )]
    pub go_bin: PathBuf,

    #[arg(
        long,
        env = "PLAY_GOROOT",
        value_name = "path",
        default_value = "/usr/local/go-faketime"
    )]
    pub goroot: Option<PathBuf>,

    #[arg(long, env = "PLAY_BUILD_TAGS", default_value = "faketime")]
    pub build_tags: String,

    #[arg(
        long,
        env = "PLAY_BUILD_TIMEOUT_MS",
        value_name = "milliseconds",
        default_value_t = 10_000
    )]
    pub build_timeout_ms: u64,

    #[arg(long, env = "PLAY_RUN_TIMEOUT_MS", value_name = "milliseconds", default_value_t = 5_000)]
    pub run_timeout_ms: u64,

    /// Time between the interrupt and the kill of a timed out compiler.
    #[arg(
        long,
        env = "PLAY_INTERRUPT_GRACE_MS",
        value_name = "milliseconds",
        default_value_t = 250
    )]
    pub interrupt_grace_ms: u64,

    #[arg(long, env = "PLAY_BACKEND_RETRIES", value_name = "count", default_value_t = 2)]
    pub backend_retries: u32,

    /// Maximum number of cached responses, 0 disables the cache.
    #[arg(long, env = "PLAY_CACHE_ENTRIES", value_name = "count", default_value_t = 4096)]
    pub cache_entries: usize,

    /// Overrides the version reported by `go env GOVERSION`.
    #[arg(long, env = "PLAY_TOOLCHAIN_VERSION")]
    pub toolchain_version: Option<String>,
}

impl PlayConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "Body", alias = "body", default)]
    pub body: String,

    /// Whether the client wants vet output along with the run.
    #[serde(rename = "WithVet", alias = "withVet", default)]
    pub with_vet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "Errors", default)]
    pub errors: String,

    #[serde(rename = "Events", default)]
    pub events: Vec<Event>,

    #[serde(rename = "Status", default)]
    pub status: i32,

    #[serde(rename = "IsTest", default)]
    pub is_test: bool,

    #[serde(rename = "TestsFailed", default)]
    pub tests_failed: usize,

    #[serde(rename = "VetErrors", default, skip_serializing_if = "String::is_empty")]
    pub vet_errors: String,

    #[serde(rename = "VetOK", default, skip_serializing_if = "std::ops::Not::not")]
    pub vet_ok: bool,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: message.into(),
            ..Default::default()
        }
    }
}
