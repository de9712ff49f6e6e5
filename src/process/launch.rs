use std::{
    env,
    ffi::{OsStr, OsString},
    os::unix::{fs::PermissionsExt, process::CommandExt},
    path::{Path, PathBuf},
    process::Command,
};

use nix::unistd::Pid;

use super::{child::ProcessHandle, Environment, StdioTable};
use crate::error::ExecError;

/// Resolves program names against a search path and spawns them.
#[derive(Debug, Clone)]
pub struct Launcher {
    search_path: Option<OsString>,
}

impl Launcher {
    pub fn new(search_path: Option<OsString>) -> Self {
        Self { search_path }
    }

    /// Snapshot of the current `PATH`.
    pub fn from_env() -> Self {
        Self::new(env::var_os("PATH"))
    }

    pub fn search_path(&self) -> Option<&OsStr> {
        self.search_path.as_deref()
    }

    /// Finds the absolute path of `program`. Names containing a `/` bypass the search.
    pub fn resolve(&self, program: &str) -> Result<PathBuf, ExecError> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return if is_executable(&path) {
                Ok(path)
            } else {
                Err(ExecError::CommandNotFound {
                    name: program.to_owned(),
                })
            };
        }

        let search_path = self
            .search_path
            .as_deref()
            .ok_or_else(|| ExecError::PathNotConfigured {
                name: program.to_owned(),
            })?;

        env::split_paths(search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(|| ExecError::CommandNotFound {
                name: program.to_owned(),
            })
    }

    /// Resolves `args[0]` and spawns it with `args` as its argument vector.
    pub fn launch(&self, args: &[String], stdio: StdioTable) -> Result<ProcessHandle, ExecError> {
        let Some(program) = args.first() else {
            return Err(ExecError::CommandNotFound {
                name: String::new(),
            });
        };

        let path = self.resolve(program)?;

        trace!(%program, path = %path.display(), "resolved command");

        spawn(&path, args, stdio, &Environment::Inherit)
    }
}

/// A candidate is accepted when it exists, is not a directory and has any execute bit.
pub fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| !meta.is_dir() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Spawns `path` with `argv` (including `argv[0]`) and the given stream table.
///
/// Returns as soon as the child exists. Every owned handle in `stdio` is closed in this
/// process before returning.
pub fn spawn<S: AsRef<OsStr>>(
    path: &Path,
    argv: &[S],
    stdio: StdioTable,
    environment: &Environment,
) -> Result<ProcessHandle, ExecError> {
    let program = argv
        .first()
        .map(|arg0| arg0.as_ref().to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut cmd = Command::new(path);

    if let Some((arg0, rest)) = argv.split_first() {
        cmd.arg0(arg0).args(rest);
    }

    if let Environment::Extend(vars) = environment {
        cmd.envs(vars.iter().map(|(key, value)| (key, value)));
    }

    cmd.stdin(stdio.stdin.into_stdio())
        .stdout(stdio.stdout.into_stdio())
        .stderr(stdio.stderr.into_stdio());

    trace!("spawning command: {:?}", cmd);

    let child = cmd.spawn().map_err(|source| ExecError::SpawnFailure {
        program: program.clone(),
        source,
    })?;

    // dropping `cmd` releases the parent's copies of the child's stream handles
    drop(cmd);

    Ok(ProcessHandle::new(Pid::from_raw(child.id() as i32), program))
}
