use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::CheckFailure;

/// What to do with the child's standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Stream through to the audit's own stdout and stderr.
    Inherit,
    /// Discard stdout, keep stderr visible.
    Quiet,
}

/// Run `program` in `dir` and wait for it, killing it once `limit` elapses.
///
/// On unix the child leads its own process group and a timeout kills the
/// whole group, so anything the program started goes down with it.
pub async fn run_bounded<S>(
    step: &str,
    program: &str,
    args: &[S],
    dir: &Path,
    output: Output,
    limit: Duration,
) -> Result<ExitStatus, CheckFailure>
where
    S: AsRef<std::ffi::OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.current_dir(dir).args(args).kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    if output == Output::Quiet {
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
    }

    tracing::debug!(step, program, ?limit, "exec: spawning");
    let mut child = cmd.spawn().map_err(|source| CheckFailure::CommandUnavailable {
        step: step.to_string(),
        program: program.to_string(),
        source,
    })?;
    let pid = child.id();

    match tokio::time::timeout(limit, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(step, status=%status, "exec: finished");
            Ok(status)
        }
        Ok(Err(source)) => Err(CheckFailure::CommandUnavailable {
            step: step.to_string(),
            program: program.to_string(),
            source,
        }),
        Err(_) => {
            kill_group(pid);
            if let Err(err) = child.kill().await {
                tracing::debug!(step, "exec: reaping timed-out child failed: {}", err);
            }
            tracing::warn!(step, ?limit, "exec: deadline elapsed, child killed");
            Err(CheckFailure::TimedOut {
                step: step.to_string(),
                after: limit,
            })
        }
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(pgid = pid, "exec: killpg failed: {}", err);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Render a program and its arguments as a single display line.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg.as_ref());
    }
    line
}
