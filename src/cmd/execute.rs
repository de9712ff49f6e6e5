use std::os::fd::OwnedFd;

use tempfile::NamedTempFile;

use super::{
    ast::{Pipeline, SimpleCommand},
    redirect::{self, ResolvedRedirects},
    worker::{WorkerLauncher, HISTORY_SNAPSHOT_VAR},
};
use crate::{
    builtins::{BuiltinCommands, BuiltinIo},
    history::SharedHistory,
    prelude::*,
    process::{
        launch::Launcher, pipe::Pipe, status::ExitStatus, Environment, ProcessHandle,
        StdioTable, StreamHandle,
    },
    state::ProcessContext,
};

/// What a finished pipeline left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// One status per stage, in stage order.
    pub statuses: Vec<ExitStatus>,
    pub pipes_created: usize,
}

impl PipelineReport {
    /// The status of the last stage, which is the status of the pipeline.
    pub fn status(&self) -> Option<&ExitStatus> {
        self.statuses.last()
    }
}

/// Runs pipelines: resolves redirects, wires pipes, spawns every stage and reaps them.
#[derive(Debug, Clone)]
pub struct Executor {
    launcher: Launcher,
    worker: WorkerLauncher,
}

impl Executor {
    pub fn new(launcher: Launcher, worker: WorkerLauncher) -> Self {
        Self { launcher, worker }
    }

    /// Runs `pipeline` to completion. Blocks until every stage has been reaped.
    ///
    /// On error nothing started by this call is left running and every descriptor it
    /// opened has been closed.
    pub fn run(
        &self,
        pipeline: &Pipeline,
        ctx: &mut ProcessContext,
    ) -> Result<PipelineReport, ExecError> {
        debug!(%pipeline, "running pipeline");

        match pipeline.commands() {
            [cmd] => self.run_single(cmd, pipeline, ctx),
            _ => self.run_chain(pipeline, &ctx.history),
        }
    }

    fn run_single(
        &self,
        cmd: &SimpleCommand,
        pipeline: &Pipeline,
        ctx: &mut ProcessContext,
    ) -> Result<PipelineReport, ExecError> {
        let pipeline_level = redirect::resolve(pipeline.redirects())?;
        let resolved = redirect::resolve(cmd.redirects())?.over(pipeline_level);

        let status: ExitStatus = if let Some(builtin) = BuiltinCommands::from_name(cmd.program()) {
            let mut io = BuiltinIo::from(resolved);
            builtin.run(cmd.args(), ctx, &mut io).into()
        } else {
            let stdio = StdioTable {
                stdin: StreamHandle::Inherit,
                stdout: resolved.stdout.into_handle(),
                stderr: resolved.stderr.into_handle(),
            };
            self.launcher.launch(cmd.args(), stdio)?.wait()?
        };

        Ok(PipelineReport {
            statuses: vec![status],
            pipes_created: 0,
        })
    }

    fn run_chain(
        &self,
        pipeline: &Pipeline,
        history: &SharedHistory,
    ) -> Result<PipelineReport, ExecError> {
        let mut last_defaults = redirect::resolve(pipeline.redirects())?;
        let mut table = ProcessTable::default();

        if let Err(err) = self.spawn_stages(pipeline, history, &mut last_defaults, &mut table) {
            warn!(%pipeline, "aborting pipeline: {err}");
            table.abort();
            return Err(err);
        }

        let pipes_created = table.pipes_created;
        let statuses = table.wait_all()?;

        Ok(PipelineReport {
            statuses,
            pipes_created,
        })
    }

    /// Spawns stages left to right. Every pipe end and redirect file this creates is
    /// owned by a local or moved into a spawn call, so an early return closes them all.
    fn spawn_stages(
        &self,
        pipeline: &Pipeline,
        history: &SharedHistory,
        last_defaults: &mut ResolvedRedirects,
        table: &mut ProcessTable,
    ) -> Result<(), ExecError> {
        let last = pipeline.len() - 1;
        let mut upstream = None::<OwnedFd>;

        for (i, cmd) in pipeline.commands().iter().enumerate() {
            let stdin = upstream.take().map_or(StreamHandle::Inherit, StreamHandle::from);
            let own = redirect::resolve(cmd.redirects())?;

            let (stdout, stderr, downstream) = if i < last {
                let pipe = Pipe::new()?;
                table.pipes_created += 1;

                (
                    own.stdout.or_handle(pipe.writer.into()),
                    own.stderr.into_handle(),
                    Some(pipe.reader),
                )
            } else {
                let defaults = std::mem::take(last_defaults);

                (
                    own.stdout.or_handle(defaults.stdout.into_handle()),
                    own.stderr.or_handle(defaults.stderr.into_handle()),
                    None,
                )
            };

            let stdio = StdioTable {
                stdin,
                stdout,
                stderr,
            };

            let child = self.spawn_stage(cmd, stdio, history, table)?;
            trace!(stage = i, pid = %child.pid(), "spawned stage");
            table.children.push(child);

            upstream = downstream;
        }

        Ok(())
    }

    fn spawn_stage(
        &self,
        cmd: &SimpleCommand,
        stdio: StdioTable,
        history: &SharedHistory,
        table: &mut ProcessTable,
    ) -> Result<ProcessHandle, ExecError> {
        let Some(builtin) = BuiltinCommands::from_name(cmd.program()) else {
            return self.launcher.launch(cmd.args(), stdio);
        };

        let environment = match builtin {
            BuiltinCommands::History(_) => match snapshot_history(history) {
                Some(snapshot) => {
                    let var = (
                        HISTORY_SNAPSHOT_VAR.to_owned(),
                        snapshot.path().to_string_lossy().into_owned(),
                    );
                    table.snapshots.push(snapshot);
                    Environment::Extend(vec![var])
                }
                None => Environment::Inherit,
            },
            _ => Environment::Inherit,
        };

        self.worker.spawn(cmd.args(), stdio, &environment)
    }
}

/// Writes the session history to a temp file for a `history` worker. The worker falls
/// back to the history file if this fails.
fn snapshot_history(history: &SharedHistory) -> Option<NamedTempFile> {
    let snapshot = NamedTempFile::new()
        .map_err(|err| warn!("failed to create history snapshot: {err}"))
        .ok()?;

    match history.lock().write_snapshot(snapshot.path()) {
        Ok(()) => Some(snapshot),
        Err(err) => {
            warn!("failed to write history snapshot: {err}");
            None
        }
    }
}

/// Children of one pipeline plus the files that must outlive them.
#[derive(Debug, Default)]
struct ProcessTable {
    children: Vec<ProcessHandle>,
    snapshots: Vec<NamedTempFile>,
    pipes_created: usize,
}

impl ProcessTable {
    /// Reaps every child, even after a failed wait. Returns the first failure.
    fn wait_all(self) -> Result<Vec<ExitStatus>, ExecError> {
        let mut statuses = Vec::with_capacity(self.children.len());
        let mut failure = None;

        for child in self.children {
            match child.wait() {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    error!("{err}");
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(statuses),
        }
    }

    /// Terminates and reaps every child.
    fn abort(self) {
        for child in &self.children {
            if let Err(err) = child.terminate() {
                warn!(pid = %child.pid(), "failed to terminate {}: {err}", child.program());
            }
        }

        for child in self.children {
            if let Err(err) = child.wait() {
                warn!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use serial_test::serial;

    use super::*;
    use crate::{
        cmd::ast::{Redirect, RedirectKind},
        config::HistoryConfig,
        history::HistoryStore,
    };

    fn executor() -> Executor {
        Executor::new(
            Launcher::from_env(),
            WorkerLauncher::new("/nonexistent/pipesh"),
        )
    }

    fn context() -> ProcessContext {
        let history = HistoryStore::new(&HistoryConfig {
            file: None,
            size: 0,
            file_size: 0,
        });
        ProcessContext::new(history.into_shared()).unwrap()
    }

    fn cmd(args: &[&str]) -> SimpleCommand {
        SimpleCommand::new(args.iter().map(|arg| arg.to_string()).collect()).unwrap()
    }

    #[test]
    #[serial]
    fn single_external_command_reports_its_status() {
        let pipeline = Pipeline::new(vec![cmd(&["sh", "-c", "exit 3"])]).unwrap();

        let report = executor().run(&pipeline, &mut context()).unwrap();

        assert_eq!(report.statuses, vec![ExitStatus::Exited(3)]);
        assert_eq!(report.pipes_created, 0);
    }

    #[test]
    #[serial]
    fn chain_output_reaches_the_pipeline_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let pipeline = Pipeline::new(vec![
            cmd(&["printf", "b\\na\\nc\\n"]),
            cmd(&["sort"]),
            cmd(&["head", "-n", "2"]),
        ])
        .unwrap()
        .with_redirect(Redirect::new(&out, RedirectKind::StdoutTruncate));

        let report = executor().run(&pipeline, &mut context()).unwrap();

        assert_eq!(report.pipes_created, 2);
        assert!(report.statuses.iter().all(ExitStatus::success));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\n");
    }

    #[test]
    #[serial]
    fn stage_redirect_beats_the_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let last = dir.path().join("last");
        let pipeline = Pipeline::new(vec![
            cmd(&["echo", "hello"]).with_redirect(Redirect::new(&first, RedirectKind::StdoutTruncate)),
            cmd(&["wc", "-c"]),
        ])
        .unwrap()
        .with_redirect(Redirect::new(&last, RedirectKind::StdoutTruncate));

        executor().run(&pipeline, &mut context()).unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(&last).unwrap().trim(), "0");
    }

    #[test]
    #[serial]
    fn missing_command_is_reported() {
        let pipeline = Pipeline::new(vec![cmd(&["pipesh-no-such-command"])]).unwrap();

        let err = executor().run(&pipeline, &mut context()).unwrap_err();

        assert!(matches!(err, ExecError::CommandNotFound { name } if name == "pipesh-no-such-command"));
    }

    #[test]
    #[serial]
    fn redirect_failure_aborts_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let pipeline = Pipeline::new(vec![
            cmd(&["touch", marker.to_str().unwrap()]),
            cmd(&["cat"]).with_redirect(Redirect::new(
                dir.path().join("missing/out"),
                RedirectKind::StdoutTruncate,
            )),
        ])
        .unwrap();

        let err = executor().run(&pipeline, &mut context()).unwrap_err();

        assert!(matches!(err, ExecError::RedirectOpenFailure { .. }));
    }

    #[test]
    #[serial]
    fn single_builtin_runs_in_process() {
        let dir = tempfile::tempdir().unwrap();
        let original = env::current_dir().unwrap();
        let mut ctx = context();
        let pipeline = Pipeline::new(vec![cmd(&["cd", dir.path().to_str().unwrap()])]).unwrap();

        let report = executor().run(&pipeline, &mut ctx).unwrap();
        let moved = env::current_dir().unwrap();
        env::set_current_dir(original).unwrap();

        assert!(report.status().unwrap().success());
        assert_eq!(moved, dir.path().canonicalize().unwrap());
        assert_eq!(ctx.working_dir(), moved);
    }

    #[test]
    #[serial]
    fn missing_worker_binary_fails_the_spawn() {
        let pipeline = Pipeline::new(vec![cmd(&["pwd"]), cmd(&["cat"])]).unwrap();

        let err = executor().run(&pipeline, &mut context()).unwrap_err();

        assert!(matches!(err, ExecError::SpawnFailure { .. }));
    }
}
