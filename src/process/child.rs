use nix::{
    errno::Errno,
    sys::{
        signal::{kill, Signal},
        wait::{waitpid, WaitStatus},
    },
    unistd::Pid,
};

use super::status::ExitStatus;
use crate::error::ExecError;

/// A spawned child that has not been reaped yet.
///
/// The handle is consumed by [`ProcessHandle::wait`], so a pid cannot be reaped twice.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    program: String,
}

impl ProcessHandle {
    pub(crate) fn new(pid: Pid, program: impl Into<String>) -> Self {
        Self {
            pid,
            program: program.into(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Asks the child to terminate. A child that already exited is not an error.
    pub fn terminate(&self) -> Result<(), Errno> {
        self.signal(Signal::SIGTERM)
    }

    pub fn signal(&self, signal: Signal) -> Result<(), Errno> {
        trace!(pid = %self.pid, program = %self.program, %signal, "signalling child");

        match kill(self.pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn wait(self) -> Result<ExitStatus, ExecError> {
        let status = wait_pid(self.pid)?;
        debug!(pid = %self.pid, program = %self.program, %status, "reaped child");
        Ok(status)
    }
}

/// Blocks until `pid` terminates and returns how it finished. Waits interrupted by a
/// caught signal are restarted.
pub fn wait_pid(pid: Pid) -> Result<ExitStatus, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => break Ok(ExitStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => break Ok(ExitStatus::Signaled(signal)),
            // stop/continue notifications are not terminal, keep waiting
            Ok(_) => continue,
            Err(Errno::EINTR) => {
                trace!(%pid, "waitpid interrupted, retrying");
                continue;
            }
            Err(source) => {
                break Err(ExecError::WaitFailure {
                    pid,
                    syscall: "waitpid",
                    source,
                })
            }
        }
    }
}
