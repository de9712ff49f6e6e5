use std::io;

use nix::sys::signal::Signal;
use tokio::{
    signal::unix::{signal, SignalKind},
    task::JoinHandle,
};

use crate::{
    cmd::execute::Executor,
    history::SharedHistory,
    input::{InputMessage, LineSource},
    parse::parse_command,
    state::ProcessContext,
};

/// The read-parse-run loop.
pub struct Shell<L> {
    input: L,
    executor: Executor,
    ctx: ProcessContext,
}

impl<L: LineSource> Shell<L> {
    pub fn new(input: L, executor: Executor, ctx: ProcessContext) -> Self {
        Self {
            input,
            executor,
            ctx,
        }
    }

    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    /// Runs until end of input, `exit`, or a fatal error, then flushes the session
    /// history. Returns the shell's exit code.
    pub async fn run(&mut self) -> i32 {
        let code = loop {
            let line = match self.input.next_line().await {
                Some(InputMessage::Line(line)) => line,
                Some(InputMessage::Invalid(line)) => {
                    warn!("skipping input line that is not valid UTF-8");
                    eprintln!("pipesh: input is not valid UTF-8, skipped: {line}");
                    continue;
                }
                Some(InputMessage::Eof) | None => {
                    debug!("end of input");
                    break 0;
                }
                Some(InputMessage::Error(err)) => {
                    error!("failed to read input: {err}");
                    eprintln!("pipesh: failed to read input: {err}");
                    break 1;
                }
            };

            if let Some(code) = self.handle_line(&line) {
                break code;
            }
        };

        if let Err(err) = self.ctx.history.lock().flush() {
            warn!("failed to save history: {err}");
        }

        code
    }

    /// Runs one line. Returns the exit code when the shell should stop.
    pub fn handle_line(&mut self, line: &str) -> Option<i32> {
        self.ctx.history.lock().push(line);

        let pipeline = match parse_command(line) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return None,
            Err(err) => {
                eprintln!("pipesh: {err}");
                return None;
            }
        };

        let res = tokio::task::block_in_place(|| self.executor.run(&pipeline, &mut self.ctx));

        match res {
            Ok(report) => trace!(?report, "pipeline finished"),
            Err(err) if err.is_fatal() => {
                error!("{err}");
                eprintln!("pipesh: {err}");
                return Some(1);
            }
            Err(err) => {
                debug!("pipeline failed: {err}");
                eprintln!("{err}");
            }
        }

        self.ctx.exit_intent()
    }
}

/// Flushes history and exits on SIGINT, SIGTERM or SIGHUP. Running pipeline stages are
/// not signalled or reaped.
pub fn spawn_signal_listener(history: SharedHistory) -> io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => Signal::SIGINT,
            _ = terminate.recv() => Signal::SIGTERM,
            _ = hangup.recv() => Signal::SIGHUP,
        };

        info!(signal = %received, "exiting on signal");

        if let Err(err) = history.lock().flush() {
            warn!("failed to save history: {err}");
        }

        std::process::exit(128 + received as i32);
    }))
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, fs};

    use async_trait::async_trait;
    use serial_test::serial;

    use super::*;
    use crate::{
        cmd::worker::WorkerLauncher,
        config::HistoryConfig,
        history::HistoryStore,
        process::launch::Launcher,
    };

    struct Scripted(VecDeque<InputMessage>);

    #[async_trait]
    impl LineSource for Scripted {
        async fn next_line(&mut self) -> Option<InputMessage> {
            self.0.pop_front()
        }
    }

    fn shell(lines: &[&str], history_file: Option<std::path::PathBuf>) -> Shell<Scripted> {
        let script = lines
            .iter()
            .map(|line| InputMessage::Line(line.to_string()))
            .collect();
        let history = HistoryStore::new(&HistoryConfig {
            file: history_file,
            size: 0,
            file_size: 0,
        });
        let ctx = ProcessContext::new(history.into_shared()).unwrap();
        let executor = Executor::new(Launcher::from_env(), WorkerLauncher::new("/nonexistent"));

        Shell::new(Scripted(script), executor, ctx)
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn exit_stops_the_loop_with_its_code() {
        let mut shell = shell(&["true", "exit 4", "touch /should/not/run"], None);
        assert_eq!(shell.run().await, 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn errors_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let last = format!("echo done > {}", out.display());

        let mut shell = shell(&["pipesh-no-such-command", "ls |", "exit abc", &last], None);

        assert_eq!(shell.run().await, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "done\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn invalid_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let script = [
            InputMessage::Invalid("echo \u{fffd}".into()),
            InputMessage::Line(format!("echo after > {}", out.display())),
        ];
        let mut shell = shell(&[], None);
        shell.input = Scripted(script.into_iter().collect());

        assert_eq!(shell.run().await, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "after\n");
        assert_eq!(shell.context().history.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn history_is_saved_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history");

        let mut shell = shell(&["true", "", "exit"], Some(file.clone()));
        assert_eq!(shell.run().await, 0);

        assert_eq!(fs::read_to_string(&file).unwrap(), "true\nexit\n");
        assert_eq!(shell.context().history.lock().len(), 2);
    }
}
