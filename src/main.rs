use std::{env, ffi::OsStr, process::ExitCode};

use color_eyre::Result;
use pipesh::{
    cmd::{
        execute::Executor,
        worker::{run_worker, WorkerLauncher, WORKER_SENTINEL},
    },
    config::{Config, LogConfig},
    history::HistoryStore,
    input::{complete::Completer, StdinSource},
    process::launch::Launcher,
    shell::{spawn_signal_listener, Shell},
    state::ProcessContext,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[macro_use]
extern crate tracing;

fn init_tracing(config: &LogConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        &config.directory,
        "pipesh.log",
    ));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .with(filter)
        .with(tracing_error::ErrorLayer::default())
        .init();

    guard
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let mut args = env::args_os();
    if args.nth(1).as_deref() == Some(OsStr::new(WORKER_SENTINEL)) {
        let args = args
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        // a worker runs its built-in even when the config file is broken
        let config = Config::load().unwrap_or_else(|_| Config::from_env());
        let _guard = init_tracing(&config.log);

        return Ok(run_worker(args, &config));
    }

    let config = Config::load()?;

    let _guard = init_tracing(&config.log);

    color_eyre::install()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let code = runtime.block_on(interactive(config));

    // the input thread may still be blocked on stdin
    runtime.shutdown_background();

    Ok(ExitCode::from(code? as u8))
}

async fn interactive(config: Config) -> Result<i32> {
    let worker = WorkerLauncher::current()?;
    trace!(exe = %worker.exe().display(), "builtin worker binary");

    let history = HistoryStore::load(&config.history).into_shared();
    spawn_signal_listener(history.clone())?;

    let launcher = Launcher::from_env();
    let input = StdinSource::spawn(
        config.prompt.clone(),
        history.clone(),
        Completer::new(&launcher),
    );

    let ctx = ProcessContext::new(history)?;
    let executor = Executor::new(launcher, worker);

    let mut shell = Shell::new(input, executor, ctx);
    let code = shell.run().await;

    info!(code, "shell exiting");

    Ok(code)
}
