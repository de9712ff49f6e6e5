use std::io::{self, Write};

use super::{BuiltinCommand, BuiltinIo};
use crate::{process::status::BuiltinExitStatus, state::ProcessContext};

#[derive(Debug, Default)]
pub struct Exit;

impl BuiltinCommand for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    /// Records the exit intent; the interactive loop acts on it once the line is done.
    fn execute(
        &self,
        args: &[String],
        ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus> {
        let code = match args {
            [_] => 0,
            [_, code] => match code.parse::<i32>() {
                Ok(code) => code,
                Err(_) => {
                    writeln!(io.stderr, "exit: {code}: numeric argument required")?;
                    return Ok(BuiltinExitStatus::new_failure());
                }
            },
            _ => {
                writeln!(io.stderr, "exit: too many arguments")?;
                return Ok(BuiltinExitStatus::new_failure());
            }
        };

        ctx.request_exit(code);

        Ok(BuiltinExitStatus::new_success())
    }
}
