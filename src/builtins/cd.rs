use std::{
    io::{self, Write},
    path::PathBuf,
};

use super::{BuiltinCommand, BuiltinIo};
use crate::{config::home_dir, process::status::BuiltinExitStatus, state::ProcessContext};

#[derive(Debug, Default)]
pub struct Cd;

impl BuiltinCommand for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn execute(
        &self,
        args: &[String],
        ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus> {
        let (shown, target) = match args {
            [_] => match home_dir() {
                Some(home) => (home.display().to_string(), home),
                None => {
                    writeln!(io.stderr, "cd: HOME not set")?;
                    return Ok(BuiltinExitStatus::new_failure());
                }
            },
            [_, dir] => (dir.clone(), expand_home(dir)),
            _ => {
                writeln!(io.stderr, "cd: too many arguments")?;
                return Ok(BuiltinExitStatus::new_failure());
            }
        };

        match ctx.change_dir(&target) {
            Ok(()) => Ok(BuiltinExitStatus::new_success()),
            Err(err) => {
                debug!("failed to cd: {}", err);
                writeln!(io.stderr, "cd: {shown}: No such file or directory")?;
                Ok(BuiltinExitStatus::new_failure())
            }
        }
    }
}

/// Expands a leading `~` or `~/` to `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path {
        "~" => Some(""),
        _ => path.strip_prefix("~/"),
    };

    match (rest, home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
