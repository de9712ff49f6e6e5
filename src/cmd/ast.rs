use std::{fmt, path::PathBuf};

use itertools::Itertools;

/// The output stream a redirect applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    StdoutTruncate,
    StdoutAppend,
    StderrTruncate,
    StderrAppend,
}

impl RedirectKind {
    pub fn stream(self) -> OutputStream {
        match self {
            Self::StdoutTruncate | Self::StdoutAppend => OutputStream::Stdout,
            Self::StderrTruncate | Self::StderrAppend => OutputStream::Stderr,
        }
    }

    pub fn appends(self) -> bool {
        matches!(self, Self::StdoutAppend | Self::StderrAppend)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::StdoutTruncate => ">",
            Self::StdoutAppend => ">>",
            Self::StderrTruncate => "2>",
            Self::StderrAppend => "2>>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: PathBuf,
    pub kind: RedirectKind,
}

impl Redirect {
    pub fn new(target: impl Into<PathBuf>, kind: RedirectKind) -> Self {
        Self {
            target: target.into(),
            kind,
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.symbol(), self.target.display())
    }
}

/// A single program invocation: `args[0]` is the program name and is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    args: Vec<String>,
    redirects: Vec<Redirect>,
}

impl SimpleCommand {
    /// Returns `None` when `args` is empty.
    pub fn new(args: Vec<String>) -> Option<Self> {
        if args.is_empty() {
            return None;
        }

        Some(Self {
            args,
            redirects: Vec::new(),
        })
    }

    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirects.push(redirect);
        self
    }

    pub fn program(&self) -> &str {
        &self.args[0]
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn redirects(&self) -> &[Redirect] {
        &self.redirects
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.iter().join(" "))?;
        for redirect in &self.redirects {
            write!(f, " {redirect}")?;
        }
        Ok(())
    }
}

/// One or more commands chained stdout-to-stdin. Pipeline-level redirects apply to
/// the last stage unless that stage redirects the same stream itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<SimpleCommand>,
    redirects: Vec<Redirect>,
}

impl Pipeline {
    /// Returns `None` when `commands` is empty.
    pub fn new(commands: Vec<SimpleCommand>) -> Option<Self> {
        if commands.is_empty() {
            return None;
        }

        Some(Self {
            commands,
            redirects: Vec::new(),
        })
    }

    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirects.push(redirect);
        self
    }

    pub fn commands(&self) -> &[SimpleCommand] {
        &self.commands
    }

    pub fn redirects(&self) -> &[Redirect] {
        &self.redirects
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.commands.iter().join(" | "))?;
        for redirect in &self.redirects {
            write!(f, " {redirect}")?;
        }
        Ok(())
    }
}
