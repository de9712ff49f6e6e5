use std::{
    collections::{HashMap, VecDeque},
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

use crate::config::HistoryConfig;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no history file configured")]
    NoHistoryFile,
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Progress of this session against one history file.
#[derive(Debug, Default, Clone, Copy)]
struct FileState {
    /// Number of session lines already appended to the file.
    appended: usize,
}

/// The session's command history plus its bookkeeping against history files.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: VecDeque<String>,
    /// In-memory limit, 0 is unlimited.
    max_entries: usize,
    /// Limit applied to the default file after appending, 0 is unlimited.
    max_file_entries: usize,
    default_file: Option<PathBuf>,
    file_states: HashMap<PathBuf, FileState>,
    /// Lines added by this session, including any trimmed from memory since.
    session_lines: usize,
}

impl HistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            max_entries: config.size,
            max_file_entries: config.file_size,
            default_file: config.file.clone(),
            ..Default::default()
        }
    }

    /// Creates the store and loads the default history file if it exists.
    pub fn load(config: &HistoryConfig) -> Self {
        let mut store = Self::new(config);

        if let Some(path) = store.default_file.clone().filter(|path| path.exists()) {
            match store.read_file(Some(&path)) {
                Ok(()) => debug!(path = %path.display(), entries = store.len(), "loaded history"),
                Err(err) => warn!("failed to load history: {err}"),
            }
        }

        store
    }

    pub fn into_shared(self) -> SharedHistory {
        SharedHistory(Arc::new(Mutex::new(self)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_file(&self) -> Option<&Path> {
        self.default_file.as_deref()
    }

    /// Records a line typed in this session. Blank lines are ignored.
    pub fn push(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        self.insert(line.to_owned());
        self.session_lines += 1;
    }

    fn insert(&mut self, line: String) {
        self.entries.push_back(line);

        if self.max_entries > 0 {
            while self.entries.len() > self.max_entries {
                self.entries.pop_front();
            }
        }
    }

    /// The last `count` entries (all of them for `None`) with their 1-based numbers.
    pub fn recent(&self, count: Option<usize>) -> impl Iterator<Item = (usize, &str)> {
        let skip = count.map_or(0, |count| self.entries.len().saturating_sub(count));

        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, line)| (index + 1, line.as_str()))
    }

    fn target(&self, path: Option<&Path>) -> Result<PathBuf, HistoryError> {
        path.map(Path::to_path_buf)
            .or_else(|| self.default_file.clone())
            .ok_or(HistoryError::NoHistoryFile)
    }

    /// Appends every line of the file to the in-memory history (`history -r`).
    pub fn read_file(&mut self, path: Option<&Path>) -> Result<(), HistoryError> {
        let path = self.target(path)?;
        let io_err = |source| HistoryError::Io {
            path: path.clone(),
            source,
        };

        let reader = BufReader::new(File::open(&path).map_err(io_err)?);
        for line in reader.lines() {
            let line = line.map_err(io_err)?;
            if !line.is_empty() {
                self.insert(line);
            }
        }

        // lines that came from the file must not be appended back to it
        self.file_states
            .entry(path)
            .or_default()
            .appended = self.session_lines;

        Ok(())
    }

    /// Replaces the file with the whole in-memory history (`history -w`).
    pub fn write_file(&mut self, path: Option<&Path>) -> Result<(), HistoryError> {
        let path = self.target(path)?;

        write_lines(&path, self.entries.iter(), false)?;

        self.file_states.entry(path).or_default().appended = self.session_lines;

        Ok(())
    }

    /// Appends the session lines not yet written to the file (`history -a`), then
    /// trims the default file to its size limit.
    pub fn append_file(&mut self, path: Option<&Path>) -> Result<(), HistoryError> {
        let path = self.target(path)?;
        let state = self.file_states.get(&path).copied().unwrap_or_default();

        let pending = self
            .session_lines
            .saturating_sub(state.appended)
            .min(self.entries.len());
        if pending == 0 {
            return Ok(());
        }

        let skip = self.entries.len() - pending;
        write_lines(&path, self.entries.iter().skip(skip), true)?;

        self.file_states.entry(path.clone()).or_default().appended = self.session_lines;

        trace!(path = %path.display(), pending, "appended history");

        if Some(path.as_path()) == self.default_file.as_deref() && self.max_file_entries > 0 {
            truncate_file(&path, self.max_file_entries)?;
        }

        Ok(())
    }

    /// Appends new session lines to the default file, if there is one.
    pub fn flush(&mut self) -> Result<(), HistoryError> {
        match self.append_file(None) {
            Err(HistoryError::NoHistoryFile) => Ok(()),
            res => res,
        }
    }

    /// Writes every entry to `path` without touching the file bookkeeping.
    pub fn write_snapshot(&self, path: &Path) -> Result<(), HistoryError> {
        write_lines(path, self.entries.iter(), false)
    }
}

fn write_lines<'a>(
    path: &Path,
    lines: impl Iterator<Item = &'a String>,
    append: bool,
) -> Result<(), HistoryError> {
    let io_err = |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(io_err)?;

    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Keeps only the last `limit` lines of the file.
fn truncate_file(path: &Path, limit: usize) -> Result<(), HistoryError> {
    let io_err = |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let contents = fs::read_to_string(path).map_err(io_err)?;
    let lines = contents.lines().collect::<Vec<_>>();
    if lines.len() <= limit {
        return Ok(());
    }

    let kept = &lines[lines.len() - limit..];
    let mut out = kept.join("\n");
    out.push('\n');
    fs::write(path, out).map_err(io_err)
}

/// The history store shared by the interactive loop, the signal listener and the
/// in-process `history` built-in.
#[derive(Debug, Clone)]
pub struct SharedHistory(Arc<Mutex<HistoryStore>>);

impl SharedHistory {
    /// Locks the store. A poisoned lock still yields the store, history is append-only
    /// and stays consistent across a panic.
    pub fn lock(&self) -> MutexGuard<'_, HistoryStore> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(file: Option<PathBuf>, size: usize, file_size: usize) -> HistoryConfig {
        HistoryConfig {
            file,
            size,
            file_size,
        }
    }

    #[test]
    fn push_skips_blank_lines_and_enforces_limit() {
        let mut store = HistoryStore::new(&config(None, 2, 0));
        store.push("one");
        store.push("   ");
        store.push("two");
        store.push("three");

        let entries = store.recent(None).collect::<Vec<_>>();
        assert_eq!(entries, vec![(1, "two"), (2, "three")]);
    }

    #[test]
    fn recent_numbers_from_the_start() {
        let mut store = HistoryStore::new(&config(None, 0, 0));
        for line in ["a", "b", "c", "d"] {
            store.push(line);
        }

        let entries = store.recent(Some(2)).collect::<Vec<_>>();
        assert_eq!(entries, vec![(3, "c"), (4, "d")]);
        assert_eq!(store.recent(Some(10)).count(), 4);
    }

    #[test]
    fn append_only_writes_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        let mut store = HistoryStore::new(&config(Some(path.clone()), 0, 0));

        store.push("echo one");
        store.flush().unwrap();
        store.push("echo two");
        store.flush().unwrap();
        store.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "echo one\necho two\n");
    }

    #[test]
    fn loaded_lines_are_not_appended_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "old\n").unwrap();

        let mut store = HistoryStore::load(&config(Some(path.clone()), 0, 0));
        assert_eq!(store.len(), 1);

        store.push("new");
        store.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }

    #[test]
    fn default_file_is_trimmed_after_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "a\nb\nc\n").unwrap();

        let mut store = HistoryStore::new(&config(Some(path.clone()), 0, 2));
        store.push("d");
        store.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "c\nd\n");
    }

    #[test]
    fn write_replaces_and_read_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other");
        fs::write(&path, "stale\n").unwrap();

        let mut store = HistoryStore::new(&config(None, 0, 0));
        store.push("first");
        store.write_file(Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");

        store.read_file(Some(&path)).unwrap();
        let entries = store.recent(None).map(|(_, line)| line).collect::<Vec<_>>();
        assert_eq!(entries, vec!["first", "first"]);
    }

    #[test]
    fn flush_without_file_is_a_no_op() {
        let mut store = HistoryStore::new(&config(None, 0, 0));
        store.push("x");
        assert!(store.flush().is_ok());
        assert!(matches!(
            store.append_file(None),
            Err(HistoryError::NoHistoryFile)
        ));
    }
}
