use crate::signal;

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use nix::unistd::Pid;
use scopeguard::{guard, ScopeGuard};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::{task, time};
use tracing::trace;

/// How a process under a deadline came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own before the deadline.
    Exited,
    /// Stopped by the interrupt sent at the deadline.
    Interrupted,
    /// Ignored the interrupt and was killed after the grace period.
    Killed,
}

#[derive(Debug)]
pub struct ProcOutput {
    pub status: ExitStatus,
    /// stdout followed by stderr.
    pub output: Vec<u8>,
    pub termination: Termination,
}

impl ProcOutput {
    pub fn timed_out(&self) -> bool {
        self.termination != Termination::Exited
    }

    pub fn success(&self) -> bool {
        !self.timed_out() && self.status.success()
    }
}

/// Runs `cmd` in its own process group. At the deadline the whole group is
/// interrupted, and killed if it is still alive after `grace`.
///
/// Failing to start the process is an error; everything the process does
/// once started is reported in [`ProcOutput`].
#[tracing::instrument(level = "trace", err, skip(cmd))]
pub async fn run_with_deadline(
    mut cmd: Command,
    deadline: Duration,
    grace: Duration,
) -> Result<ProcOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    trace!(?cmd);

    let mut child = cmd.spawn().context("failed to start process")?;
    let pgid = match child.id() {
        Some(id) => Pid::from_raw(id as i32),
        None => return Err(anyhow!("process exited before it could be tracked")),
    };

    // Kills the group if we are cancelled while the leader is still unreaped.
    let reaper = guard(pgid, signal::kill_group);

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let collector = task::spawn(async move {
        let (out, err) = tokio::join!(read_all(stdout), read_all(stderr));
        let mut output = out?;
        output.extend(err?);
        Ok::<_, io::Error>(output)
    });
    let mut collector = guard(collector, |h| h.abort());

    let (status, termination) = wait_or_stop(&mut child, pgid, deadline, grace).await?;
    ScopeGuard::into_inner(reaper);

    trace!(?status, ?termination);

    let output = match time::timeout(grace, &mut *collector).await {
        Ok(joined) => joined
            .context("output collector panicked")?
            .context("failed to read process output")?,
        Err(_) => return Err(anyhow!("process output was not closed after exit")),
    };

    Ok(ProcOutput {
        status,
        output,
        termination,
    })
}

async fn wait_or_stop(
    child: &mut Child,
    pgid: Pid,
    deadline: Duration,
    grace: Duration,
) -> Result<(ExitStatus, Termination)> {
    tokio::select! {
        status = child.wait() => {
            Ok((status.context("failed to wait process")?, Termination::Exited))
        }
        _ = time::sleep(deadline) => {
            trace!(?pgid, "deadline exceeded, interrupting");
            signal::interrupt_group(pgid);
            match time::timeout(grace, child.wait()).await {
                Ok(status) => {
                    // Stragglers in the group would hold the pipes open.
                    signal::kill_group(pgid);
                    Ok((status.context("failed to wait process")?, Termination::Interrupted))
                }
                Err(_) => {
                    trace!(?pgid, "grace period exceeded, killing");
                    signal::kill_group(pgid);
                    let status = child.wait().await.context("failed to wait process")?;
                    Ok((status, Termination::Killed))
                }
            }
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
