use std::io::{self, Write};

use super::{BuiltinCommand, BuiltinIo};
use crate::{process::status::BuiltinExitStatus, state::ProcessContext};

#[derive(Debug, Default)]
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn execute(
        &self,
        _args: &[String],
        _ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus> {
        match std::env::current_dir() {
            Ok(cwd) => {
                writeln!(io.stdout, "{}", cwd.display())?;
                Ok(BuiltinExitStatus::new_success())
            }
            Err(err) => {
                writeln!(io.stderr, "pwd: {err}")?;
                Ok(BuiltinExitStatus::new_failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::builtins::test_support::{args, context, Captured};

    #[test]
    #[serial]
    fn prints_the_working_directory() {
        let mut out = Captured::new();
        let status = Pwd
            .execute(&args(&["pwd"]), &mut context(), &mut out.io)
            .unwrap();

        assert!(status.success());
        assert_eq!(
            out.stdout(),
            format!("{}\n", std::env::current_dir().unwrap().display())
        );
    }
}
