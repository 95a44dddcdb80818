// Worker process lifecycle: spawn once, kill on request.

use mplz_proxy_core::{ProxyError, Result, WorkerCommand};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{error, info};

/// Owned handle to the worker child process.
///
/// Stdin and stdout are piped and held for the lifetime of the handle but
/// never read or written. Nothing is cleaned up on drop unless the handle
/// was spawned with `kill_on_drop`.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: Option<u32>,
}

impl WorkerProcess {
    pub fn spawn(command: &WorkerCommand, kill_on_drop: bool) -> Result<Self> {
        let program = resolve_program(&command.program)?;

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(kill_on_drop);
        if let Some(dir) = &command.working_directory {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            error!(
                program = %program.display(),
                error = %e,
                "Failed to spawn worker"
            );
            ProxyError::Spawn(e)
        })?;
        let pid = child.id();

        info!(
            program = %program.display(),
            args = ?command.args,
            pid = ?pid,
            "Worker spawned"
        );

        Ok(Self { child, pid })
    }

    /// OS process id captured at spawn time
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Sends a kill signal and returns immediately. The exit is not awaited
    /// and the exit code is not checked.
    pub fn kill(&mut self) -> Result<()> {
        info!(pid = ?self.pid, "Killing worker");
        self.child.start_kill().map_err(ProxyError::Kill)
    }

    /// Exit status if the worker has already terminated.
    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }
}

// Bare names are looked up on PATH; anything with a separator is passed
// through and left for the OS to reject.
fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    which::which(program).map_err(|_| ProxyError::ProgramNotFound(program.to_string()))
}
