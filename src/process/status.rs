use std::fmt;

use nix::sys::signal::Signal;

/// How a pipeline stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(Signal),
    Builtin(BuiltinExitStatus),
}

impl From<BuiltinExitStatus> for ExitStatus {
    fn from(value: BuiltinExitStatus) -> Self {
        Self::Builtin(value)
    }
}

impl ExitStatus {
    /// The exit code, if the stage exited rather than being killed.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
            Self::Builtin(status) => Some(status.code()),
        }
    }

    /// The conventional `$?` value: the exit code, or `128 + signal`.
    pub fn shell_code(&self) -> i32 {
        match self {
            Self::Signaled(signal) => 128 + *signal as i32,
            _ => self.code().unwrap_or(1),
        }
    }

    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with {code}"),
            Self::Signaled(signal) => write!(f, "killed by {signal}"),
            Self::Builtin(status) => write!(f, "builtin exited with {}", status.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinExitStatus(i32);

impl BuiltinExitStatus {
    pub fn new_success() -> Self {
        Self(0)
    }

    pub fn new_failure() -> Self {
        Self(1)
    }

    pub fn success(&self) -> bool {
        self.0 == 0
    }

    pub fn failure(&self) -> bool {
        !self.success()
    }

    pub fn code(&self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_codes() {
        assert_eq!(ExitStatus::Exited(3).shell_code(), 3);
        assert_eq!(ExitStatus::Signaled(Signal::SIGTERM).shell_code(), 143);
        assert!(ExitStatus::from(BuiltinExitStatus::new_success()).success());
        assert!(!ExitStatus::Signaled(Signal::SIGKILL).success());
    }
}
