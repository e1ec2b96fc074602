//! Where job files come from.
//!
//! Translation reads the main document and its forms through a
//! [`SourceProvider`]. Form references in VIPP are written loosely: the
//! case rarely matches the file on disk and the `.frm` extension is often
//! left off. [`SourceProvider::find_overlay`] settles a reference to one
//! file using only the two primitive operations a provider implements.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

const FORM_EXTENSION: &str = "frm";

pub trait SourceProvider {
    fn read_source(&self, path: &Path) -> io::Result<String>;

    /// Files directly inside `dir`, sorted by path.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Find the form file `reference` names, relative to `dir`.
    ///
    /// An exact match wins. Otherwise file names are compared ignoring
    /// ASCII case, and a reference without an extension also matches
    /// `<reference>.frm` in any case.
    fn find_overlay(&self, dir: &Path, reference: &str) -> io::Result<PathBuf> {
        let wanted = dir.join(reference.replace('\\', "/"));
        let (Some(parent), Some(name)) = (wanted.parent(), wanted.file_name()) else {
            return Err(not_found(&wanted));
        };
        let name = name.to_string_lossy();
        let entries = self.list_dir(parent)?;
        if let Some(exact) = entries.iter().find(|e| e.file_name() == wanted.file_name()) {
            return Ok(exact.clone());
        }
        entries
            .into_iter()
            .find(|e| form_name_matches(e, &name))
            .ok_or_else(|| not_found(&wanted))
    }
}

fn form_name_matches(entry: &Path, name: &str) -> bool {
    let Some(file) = entry.file_name().map(|f| f.to_string_lossy()) else {
        return false;
    };
    if file.eq_ignore_ascii_case(name) {
        return true;
    }
    if Path::new(name).extension().is_some() {
        return false;
    }
    match file.rsplit_once('.') {
        Some((stem, ext)) => {
            stem.eq_ignore_ascii_case(name) && ext.eq_ignore_ascii_case(FORM_EXTENSION)
        }
        None => false,
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no form file matches {}", path.display()),
    )
}

/// Reads jobs from disk. This is what [`crate::translate()`] uses.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Serves a job from memory, for tests and embedders. Paths are compared
/// after lexical `.`/`..` removal.
pub struct InMemoryProvider {
    files: BTreeMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new(files: impl IntoIterator<Item = (PathBuf, String)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, text)| (lexical(&path), text))
                .collect(),
        }
    }
}

fn lexical(path: &Path) -> PathBuf {
    path.components().fold(PathBuf::new(), |mut out, c| {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
        out
    })
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        let path = lexical(path);
        self.files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory file {}", path.display()),
            )
        })
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = lexical(dir);
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .cloned()
            .collect())
    }
}
