use std::{
    io::{self, Write},
    path::Path,
};

use super::{BuiltinCommand, BuiltinIo};
use crate::{process::status::BuiltinExitStatus, state::ProcessContext};

#[derive(Debug, Default)]
pub struct History;

impl BuiltinCommand for History {
    fn name(&self) -> &'static str {
        "history"
    }

    /// `history [N]` lists entries, `history -r|-w|-a [FILE]` reads, writes or appends
    /// the history file.
    fn execute(
        &self,
        args: &[String],
        ctx: &mut ProcessContext,
        io: &mut BuiltinIo,
    ) -> io::Result<BuiltinExitStatus> {
        let mut store = ctx.history.lock();
        let file = args.get(2).map(Path::new);

        let res = match args.get(1).map(String::as_str) {
            Some("-r") => store.read_file(file),
            Some("-w") => store.write_file(file),
            Some("-a") => store.append_file(file),
            Some(count) => {
                let Ok(count) = count.parse::<usize>() else {
                    writeln!(io.stderr, "history: {count}: numeric argument required")?;
                    return Ok(BuiltinExitStatus::new_failure());
                };
                for (number, line) in store.recent(Some(count)) {
                    writeln!(io.stdout, "{number:>5}  {line}")?;
                }
                Ok(())
            }
            None => {
                for (number, line) in store.recent(None) {
                    writeln!(io.stdout, "{number:>5}  {line}")?;
                }
                Ok(())
            }
        };

        match res {
            Ok(()) => Ok(BuiltinExitStatus::new_success()),
            Err(err) => {
                writeln!(io.stderr, "history: {err}")?;
                Ok(BuiltinExitStatus::new_failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::builtins::test_support::{args, context, Captured};

    fn seeded(lines: &[&str]) -> ProcessContext {
        let ctx = context();
        for line in lines {
            ctx.history.lock().push(line);
        }
        ctx
    }

    #[test]
    fn lists_all_or_the_last_n() {
        let mut ctx = seeded(&["ls", "pwd", "history"]);

        let mut out = Captured::new();
        History.execute(&args(&["history"]), &mut ctx, &mut out.io).unwrap();
        assert_eq!(out.stdout(), "    1  ls\n    2  pwd\n    3  history\n");

        let mut out = Captured::new();
        History.execute(&args(&["history", "2"]), &mut ctx, &mut out.io).unwrap();
        assert_eq!(out.stdout(), "    2  pwd\n    3  history\n");
    }

    #[test]
    fn rejects_non_numeric_counts() {
        let mut ctx = seeded(&["ls"]);
        let mut out = Captured::new();

        let status = History
            .execute(&args(&["history", "abc"]), &mut ctx, &mut out.io)
            .unwrap();

        assert!(status.failure());
        assert_eq!(out.stderr(), "history: abc: numeric argument required\n");
    }

    #[test]
    fn file_flags_round_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        let path_arg = path.to_str().unwrap();

        let mut ctx = seeded(&["echo one", "echo two"]);
        let mut out = Captured::new();
        History
            .execute(&args(&["history", "-w", path_arg]), &mut ctx, &mut out.io)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo one\necho two\n");

        let mut fresh = context();
        History
            .execute(&args(&["history", "-r", path_arg]), &mut fresh, &mut out.io)
            .unwrap();
        assert_eq!(fresh.history.lock().len(), 2);
    }

    #[test]
    fn missing_default_file_is_reported() {
        let mut ctx = seeded(&["ls"]);
        let mut out = Captured::new();

        let status = History
            .execute(&args(&["history", "-a"]), &mut ctx, &mut out.io)
            .unwrap();

        assert!(status.failure());
        assert_eq!(out.stderr(), "history: no history file configured\n");
    }
}
