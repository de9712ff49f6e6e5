use std::{
    fs::File,
    io::{self, Write},
};

use enum_dispatch::enum_dispatch;
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    cmd::redirect::{Resolved, ResolvedRedirects},
    process::status::BuiltinExitStatus,
    state::ProcessContext,
};

pub mod cd;
pub mod exit;
pub mod history;
pub mod pwd;
pub mod type_;

#[enum_dispatch(BuiltinCommands)]
pub trait BuiltinCommand {
    fn name(&self) -> &'static str;

    /// `args[0]` is the built-in's own name.
    fn execute(
        &self,
        args: &[String],
        ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus>;
}

#[enum_dispatch]
#[derive(Debug, EnumIter)]
pub enum BuiltinCommands {
    Cd(cd::Cd),
    Pwd(pwd::Pwd),
    Exit(exit::Exit),
    Type(type_::Type),
    History(history::History),
}

impl BuiltinCommands {
    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|cmd| cmd.name() == name)
    }

    pub fn is_builtin(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    /// Runs the built-in, folding output errors (a closed pipe, a full disk) into a
    /// failed status.
    pub fn run(
        &self,
        args: &[String],
        ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> BuiltinExitStatus {
        trace!("executing {} builtin: {args:?}", self.name());

        let status = self
            .execute(args, ctx, io)
            .and_then(|status| io.flush().map(|()| status));

        match status {
            Ok(status) => status,
            Err(err) => {
                error!("{} failed to write output: {}", self.name(), err);
                BuiltinExitStatus::new_failure()
            }
        }
    }
}

/// Where a built-in writes: the shell's own streams or a redirect target.
#[derive(Debug)]
pub enum Output {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(File),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(stdout) => stdout.write(buf),
            Self::Stderr(stderr) => stderr.write(buf),
            Self::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(stdout) => stdout.flush(),
            Self::Stderr(stderr) => stderr.flush(),
            Self::File(file) => file.flush(),
        }
    }
}

#[derive(Debug)]
pub struct BuiltinIo {
    pub stdout: Output,
    pub stderr: Output,
}

impl BuiltinIo {
    /// The streams this process was started with.
    pub fn inherited() -> Self {
        Self {
            stdout: Output::Stdout(io::stdout()),
            stderr: Output::Stderr(io::stderr()),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()?;
        self.stderr.flush()
    }
}

impl From<ResolvedRedirects> for BuiltinIo {
    fn from(value: ResolvedRedirects) -> Self {
        Self {
            stdout: match value.stdout {
                Resolved::Default => Output::Stdout(io::stdout()),
                Resolved::File(file) => Output::File(file),
            },
            stderr: match value.stderr {
                Resolved::Default => Output::Stderr(io::stderr()),
                Resolved::File(file) => Output::File(file),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use super::*;
    use crate::{config::HistoryConfig, history::HistoryStore};

    pub struct Captured {
        pub io: BuiltinIo,
        _dir: tempfile::TempDir,
        out: PathBuf,
        err: PathBuf,
    }

    impl Captured {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("stdout");
            let err = dir.path().join("stderr");
            let io = BuiltinIo {
                stdout: Output::File(File::create(&out).unwrap()),
                stderr: Output::File(File::create(&err).unwrap()),
            };
            Self {
                io,
                _dir: dir,
                out,
                err,
            }
        }

        fn read(&mut self, path: &Path) -> String {
            self.io.flush().unwrap();
            fs::read_to_string(path).unwrap()
        }

        pub fn stdout(&mut self) -> String {
            let path = self.out.clone();
            self.read(&path)
        }

        pub fn stderr(&mut self) -> String {
            let path = self.err.clone();
            self.read(&path)
        }
    }

    pub fn context() -> ProcessContext {
        let history = HistoryStore::new(&HistoryConfig {
            file: None,
            size: 0,
            file_size: 0,
        });
        ProcessContext::new(history.into_shared()).unwrap()
    }

    pub fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }
}
