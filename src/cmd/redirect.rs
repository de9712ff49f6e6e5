use std::{
    fs::{File, OpenOptions},
    os::unix::fs::OpenOptionsExt,
};

use super::ast::{OutputStream, Redirect};
use crate::{error::ExecError, process::StreamHandle};

/// The outcome of resolving the redirects for one stream.
#[derive(Debug, Default)]
pub enum Resolved {
    /// No redirect applies, use whatever the context provides.
    #[default]
    Default,
    File(File),
}

impl Resolved {
    /// The redirected file, or `fallback` when nothing was redirected. A fallback that
    /// loses to a redirect is dropped here, closing it.
    pub fn or_handle(self, fallback: StreamHandle) -> StreamHandle {
        match self {
            Self::Default => fallback,
            Self::File(file) => {
                drop(fallback);
                StreamHandle::from(file)
            }
        }
    }

    pub fn into_handle(self) -> StreamHandle {
        self.or_handle(StreamHandle::Inherit)
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

/// Resolved stdout and stderr for one redirect list.
#[derive(Debug, Default)]
pub struct ResolvedRedirects {
    pub stdout: Resolved,
    pub stderr: Resolved,
}

impl ResolvedRedirects {
    fn slot_mut(&mut self, stream: OutputStream) -> &mut Resolved {
        match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        }
    }

    /// Layers `self` over `fallback`: streams redirected here win, the rest come from
    /// `fallback`.
    pub fn over(self, fallback: ResolvedRedirects) -> ResolvedRedirects {
        fn pick(primary: Resolved, fallback: Resolved) -> Resolved {
            match primary {
                Resolved::Default => fallback,
                file => file,
            }
        }

        ResolvedRedirects {
            stdout: pick(self.stdout, fallback.stdout),
            stderr: pick(self.stderr, fallback.stderr),
        }
    }
}

/// Opens the files named by `redirects`, in order.
///
/// A later redirect of the same stream closes the earlier file before opening its own.
/// If any open fails, every file opened by this call is closed before the error is
/// returned.
pub fn resolve(redirects: &[Redirect]) -> Result<ResolvedRedirects, ExecError> {
    let mut resolved = ResolvedRedirects::default();

    for redirect in redirects {
        let slot = resolved.slot_mut(redirect.kind.stream());

        if !slot.is_default() {
            trace!(%redirect, "superseding earlier redirect");
        }
        *slot = Resolved::Default;

        *slot = Resolved::File(open(redirect)?);
    }

    Ok(resolved)
}

fn open(redirect: &Redirect) -> Result<File, ExecError> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).mode(0o644);

    if redirect.kind.appends() {
        options.append(true);
    } else {
        options.truncate(true);
    }

    trace!(%redirect, "opening redirect target");

    options
        .open(&redirect.target)
        .map_err(|source| ExecError::RedirectOpenFailure {
            path: redirect.target.clone(),
            source,
        })
}
