//! Process-group handling so cancellation reaches every descendant.

use tokio::process::{Child, Command};

/// Places the child in a new process group led by itself (Unix).
#[cfg(unix)]
pub(crate) fn configure_process_group(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn configure_process_group(command: &mut Command) {
    let _ = command;
}

/// Sends SIGKILL to the group led by `pid`, falling back to the pid alone.
#[cfg(unix)]
fn kill_group(pid: u32) -> bool {
    let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if raw_pid <= 0 {
        return false;
    }
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(-raw_pid, libc::SIGKILL) == 0 || libc::kill(raw_pid, libc::SIGKILL) == 0 }
}

/// Kills the child and its process group, then reaps the child.
pub(crate) async fn terminate_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let signalled = child.id().is_some_and(kill_group);
        if !signalled {
            let _ = child.start_kill();
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    let _ = child.wait().await;
}
