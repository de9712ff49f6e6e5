use std::{
    env, io,
    path::{Path, PathBuf},
};

use crate::history::SharedHistory;

/// Per-process shell state that only in-process built-ins may change.
///
/// The working directory and exit intent belong to the process running the shell, so a
/// built-in running in a worker process mutates the worker's own context, never this one.
#[derive(Debug)]
pub struct ProcessContext {
    working_dir: PathBuf,
    exit_intent: Option<i32>,
    pub history: SharedHistory,
}

impl ProcessContext {
    pub fn new(history: SharedHistory) -> io::Result<Self> {
        Ok(Self {
            working_dir: env::current_dir()?,
            exit_intent: None,
            history,
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Changes the process working directory and records the canonical result.
    pub fn change_dir(&mut self, path: &Path) -> io::Result<()> {
        let target = self.working_dir.join(path).canonicalize()?;

        trace!("cd: {:?}", target);

        env::set_current_dir(&target)?;
        self.working_dir = target;

        Ok(())
    }

    pub fn request_exit(&mut self, code: i32) {
        self.exit_intent = Some(code);
    }

    pub fn exit_intent(&self) -> Option<i32> {
        self.exit_intent
    }
}
