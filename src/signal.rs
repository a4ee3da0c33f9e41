use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::trace;

/// Signals every process in the group led by `pgid`.
pub fn send_group_signal(pgid: Pid, signal: Signal) -> nix::Result<()> {
    let result = signal::killpg(pgid, signal);
    trace!(
        "killpg pgid = {}, signal = {}, result = {:?}",
        pgid,
        signal,
        result
    );
    result
}

pub fn interrupt_group(pgid: Pid) {
    let _ = send_group_signal(pgid, Signal::SIGINT);
}

pub fn kill_group(pgid: Pid) {
    let _ = send_group_signal(pgid, Signal::SIGKILL);
}
