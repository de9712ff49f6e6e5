use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::error::ExecError;

/// A kernel pipe. Both ends are close-on-exec so that only the process a handle is
/// explicitly given to ends up holding it.
#[derive(Debug)]
pub struct Pipe {
    pub reader: OwnedFd,
    pub writer: OwnedFd,
}

impl Pipe {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    pub fn new() -> Result<Self, ExecError> {
        use nix::{fcntl::OFlag, unistd::pipe2};

        let (reader, writer) =
            pipe2(OFlag::O_CLOEXEC).map_err(|source| ExecError::PipeCreationFailure {
                syscall: "pipe2",
                source,
            })?;

        Ok(Self::from_raw(reader, writer))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    pub fn new() -> Result<Self, ExecError> {
        use std::os::fd::AsRawFd;

        use nix::{
            fcntl::{fcntl, FcntlArg, FdFlag},
            unistd::pipe,
        };

        let (reader, writer) = pipe().map_err(|source| ExecError::PipeCreationFailure {
            syscall: "pipe",
            source,
        })?;

        let pipe = Self::from_raw(reader, writer);

        for fd in [&pipe.reader, &pipe.writer] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(|source| {
                ExecError::PipeCreationFailure {
                    syscall: "fcntl",
                    source,
                }
            })?;
        }

        Ok(pipe)
    }

    /// Takes ownership of a descriptor pair fresh from `pipe`/`pipe2`.
    fn from_raw(reader: RawFd, writer: RawFd) -> Self {
        // SAFETY: both descriptors were just returned by the kernel and nothing else owns them.
        let pipe = unsafe {
            Self {
                reader: OwnedFd::from_raw_fd(reader),
                writer: OwnedFd::from_raw_fd(writer),
            }
        };

        trace!(?pipe, "created pipe");

        pipe
    }
}
