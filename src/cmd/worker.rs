use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::ExitCode,
};

use crate::{
    builtins::{BuiltinCommands, BuiltinIo},
    config::Config,
    history::HistoryStore,
    prelude::*,
    process::{launch, Environment, ProcessHandle, StdioTable},
    state::ProcessContext,
};

/// First argument that turns the shell binary into a single built-in worker.
pub const WORKER_SENTINEL: &str = "__pipesh_builtin_worker__";

/// Path of a history snapshot written by the parent for a `history` worker.
pub const HISTORY_SNAPSHOT_VAR: &str = "PIPESH_HISTORY_SNAPSHOT";

/// Spawns built-ins as separate processes by re-running the shell's own binary.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    exe: PathBuf,
}

impl WorkerLauncher {
    /// Locates the running shell binary.
    pub fn current() -> Result<Self, ExecError> {
        let exe = env::current_exe()
            .map_err(|source| ExecError::WorkerBinaryUnavailable { source })?;
        Ok(Self::new(exe))
    }

    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Starts a worker running the built-in `args[0]` with the given streams.
    pub fn spawn(
        &self,
        args: &[String],
        stdio: StdioTable,
        environment: &Environment,
    ) -> Result<ProcessHandle, ExecError> {
        let argv = [self.exe.as_os_str().to_owned(), WORKER_SENTINEL.into()]
            .into_iter()
            .chain(args.iter().map(OsString::from))
            .collect::<Vec<_>>();

        trace!(exe = %self.exe.display(), ?args, "spawning builtin worker");

        launch::spawn(&self.exe, &argv, stdio, environment)
    }
}

/// Body of a worker process: runs exactly one built-in on the inherited streams.
///
/// `args` is the built-in's argument vector, the part after the sentinel.
pub fn run_worker(args: Vec<String>, config: &Config) -> ExitCode {
    let Some(builtin) = args.first().and_then(|name| BuiltinCommands::from_name(name)) else {
        let name = args.first().map(String::as_str).unwrap_or_default();
        eprintln!("pipesh: {name}: not a shell builtin");
        return ExitCode::FAILURE;
    };

    let history = match env::var_os(HISTORY_SNAPSHOT_VAR) {
        Some(snapshot) => {
            let mut store = HistoryStore::new(&config.history);
            if let Err(err) = store.read_file(Some(Path::new(&snapshot))) {
                warn!("failed to read history snapshot: {err}");
            }
            store
        }
        None => HistoryStore::load(&config.history),
    };

    let mut ctx = match ProcessContext::new(history.into_shared()) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("pipesh: {err}");
            return ExitCode::FAILURE;
        }
    };

    let status = builtin.run(&args, &mut ctx, &mut BuiltinIo::inherited());

    debug!(builtin = %args[0], code = status.code(), "worker finished");

    if status.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
