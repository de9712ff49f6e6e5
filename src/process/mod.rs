use std::{fs::File, os::fd::OwnedFd, process::Stdio};

pub mod child;
pub mod launch;
pub mod pipe;
pub mod status;

pub use child::ProcessHandle;

/// One of the three standard stream slots a child is spawned with.
///
/// `Owned` handles are moved into the spawn call; the parent's copy is closed as soon
/// as the spawn returns, whether it succeeded or not.
#[derive(Debug, Default)]
pub enum StreamHandle {
    #[default]
    Inherit,
    Owned(OwnedFd),
}

impl StreamHandle {
    pub fn into_stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Owned(fd) => Stdio::from(fd),
        }
    }
}

impl From<OwnedFd> for StreamHandle {
    fn from(value: OwnedFd) -> Self {
        Self::Owned(value)
    }
}

impl From<File> for StreamHandle {
    fn from(value: File) -> Self {
        Self::Owned(value.into())
    }
}

/// The stdin/stdout/stderr table handed to a new process.
#[derive(Debug, Default)]
pub struct StdioTable {
    pub stdin: StreamHandle,
    pub stdout: StreamHandle,
    pub stderr: StreamHandle,
}

/// How a child's environment is built: always the parent's, optionally with extras.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    #[default]
    Inherit,
    Extend(Vec<(String, String)>),
}
