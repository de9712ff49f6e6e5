use std::{
    collections::BTreeSet,
    env,
    ffi::OsString,
    fs,
    path::Path,
};

use strum::IntoEnumIterator;

use crate::{
    builtins::{BuiltinCommand, BuiltinCommands},
    process::launch::{is_executable, Launcher},
};

/// Tab-completion candidates: command names in command position, paths elsewhere.
#[derive(Debug, Clone, Default)]
pub struct Completer {
    search_path: Option<OsString>,
}

impl Completer {
    pub fn new(launcher: &Launcher) -> Self {
        Self {
            search_path: launcher.search_path().map(ToOwned::to_owned),
        }
    }

    /// Built-ins and executables on the search path starting with `prefix`, sorted and
    /// without duplicates.
    pub fn commands(&self, prefix: &str) -> Vec<String> {
        let mut names = BuiltinCommands::iter()
            .map(|builtin| builtin.name().to_owned())
            .filter(|name| name.starts_with(prefix))
            .collect::<BTreeSet<_>>();

        let dirs = self.search_path.iter().flat_map(env::split_paths);
        for dir in dirs {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };

            for entry in entries.flatten() {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if name.starts_with(prefix) && is_executable(&entry.path()) {
                    names.insert(name);
                }
            }
        }

        names.into_iter().collect()
    }

    /// Entries of the directory named by `prefix` up to its last `/` (the working
    /// directory if there is none) whose names start with the rest. Directories get a
    /// trailing `/`. Hidden entries only match a prefix starting with `.`.
    pub fn paths(&self, prefix: &str) -> Vec<String> {
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(slash) => prefix.split_at(slash + 1),
            None => ("", prefix),
        };
        let dir = if dir_part.is_empty() {
            Path::new(".")
        } else {
            Path::new(dir_part)
        };

        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut matches = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                if !name.starts_with(name_prefix)
                    || (name.starts_with('.') && !name_prefix.starts_with('.'))
                {
                    return None;
                }

                let slash = if entry.path().is_dir() { "/" } else { "" };
                Some(format!("{dir_part}{name}{slash}"))
            })
            .collect::<Vec<_>>();

        matches.sort();
        matches
    }
}

/// The longest prefix shared by every candidate.
pub fn common_prefix(candidates: &[String]) -> &str {
    let Some((first, rest)) = candidates.split_first() else {
        return "";
    };

    let mut len = first.len();
    for candidate in rest {
        len = first
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((idx, a), _)| idx + a.len_utf8())
            .min(len);
    }

    &first[..len]
}
