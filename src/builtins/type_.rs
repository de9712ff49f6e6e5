use std::io::{self, Write};

use super::{BuiltinCommand, BuiltinCommands, BuiltinIo};
use crate::{
    process::{launch::Launcher, status::BuiltinExitStatus},
    state::ProcessContext,
};

#[derive(Debug, Default)]
pub struct Type;

impl BuiltinCommand for Type {
    fn name(&self) -> &'static str {
        "type"
    }

    fn execute(
        &self,
        args: &[String],
        _ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus> {
        describe(&args[1..], &Launcher::from_env(), io)
    }
}

fn describe(
    names: &[String],
    launcher: &Launcher,
    io: &mut BuiltinIo,
) -> io::Result<BuiltinExitStatus> {
    let mut status = BuiltinExitStatus::new_success();

    for name in names {
        if BuiltinCommands::is_builtin(name) {
            writeln!(io.stdout, "{name} is a shell builtin")?;
            continue;
        }

        match launcher.resolve(name) {
            Ok(path) => writeln!(io.stdout, "{name} is {}", path.display())?,
            Err(_) => {
                writeln!(io.stderr, "{name}: not found")?;
                status = BuiltinExitStatus::new_failure();
            }
        }
    }

    Ok(status)
}
