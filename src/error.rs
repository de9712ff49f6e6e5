use std::{io, path::PathBuf};

use nix::{errno::Errno, unistd::Pid};
use thiserror::Error;

/// Everything that can go wrong while turning a [`Pipeline`](crate::cmd::ast::Pipeline)
/// into running processes.
///
/// All variants abort only the pipeline that raised them, except
/// [`ExecError::WorkerBinaryUnavailable`] which the interactive loop treats as fatal.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{name}: command not found")]
    CommandNotFound { name: String },
    #[error("{name}: cannot search for command, PATH is not set")]
    PathNotConfigured { name: String },
    #[error("{}: {source}", path.display())]
    RedirectOpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create pipe ({syscall}): {source}")]
    PipeCreationFailure {
        syscall: &'static str,
        #[source]
        source: Errno,
    },
    #[error("{program}: failed to spawn: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to reap process {pid} ({syscall}): {source}")]
    WaitFailure {
        pid: Pid,
        syscall: &'static str,
        #[source]
        source: Errno,
    },
    #[error("cannot locate the shell binary for built-in workers: {source}")]
    WorkerBinaryUnavailable {
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WorkerBinaryUnavailable { .. })
    }
}
