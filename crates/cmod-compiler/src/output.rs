//! Module directory output.
//!
//! Every file is first written to a temporary file inside the target
//! directory and only renamed into place once all of them were written, so a
//! failed run leaves no partial module behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cmod_codegen::GeneratedUnit;
use cmod_types::{CmodError, ErrorCode, Span};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    /// One of the files to write is already there.
    #[error("module already exists: {}; call with --clear to overwrite existing files", .0.display())]
    ModuleExists(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    fn io(path: &Path, source: io::Error) -> Self {
        OutputError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OutputError::ModuleExists(_) => ErrorCode::MODULE_EXISTS,
            OutputError::Io { .. } => ErrorCode::OUTPUT_IO,
        }
    }

    /// The error as a diagnostic against the offending path.
    pub fn to_diagnostic(&self) -> CmodError {
        let path = match self {
            OutputError::ModuleExists(path) => path,
            OutputError::Io { path, .. } => path,
        };
        CmodError::new(
            path.display().to_string(),
            self.code(),
            self.to_string(),
            Span::point(1, 1),
            "",
        )
    }
}

pub type OutputResult<T> = Result<T, OutputError>;

// ── Paths ────────────────────────────────────────────────────────────────────

pub fn makefile_path(dir: &Path) -> PathBuf {
    dir.join("micropython.mk")
}

pub fn code_path(dir: &Path, module_name: &str) -> PathBuf {
    dir.join(format!("{module_name}.c"))
}

pub fn qstrdefs_path(dir: &Path, module_name: &str) -> PathBuf {
    dir.join(cmod_codegen::makefile::qstrdefs_file_name(module_name))
}

// ── Operations ───────────────────────────────────────────────────────────────

pub fn module_exists(dir: &Path) -> bool {
    dir.exists()
}

/// Remove the generated files of `module_name` from `dir`, then the
/// directory itself once it is empty. A missing directory is not an error.
pub fn clear_module(dir: &Path, module_name: &str) -> OutputResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for path in [
        makefile_path(dir),
        code_path(dir, module_name),
        qstrdefs_path(dir, module_name),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(OutputError::io(&path, e)),
        }
    }
    let is_empty = fs::read_dir(dir)
        .map_err(|e| OutputError::io(dir, e))?
        .next()
        .is_none();
    if is_empty {
        fs::remove_dir(dir).map_err(|e| OutputError::io(dir, e))?;
    }
    Ok(())
}

/// Write `<module>.c`, `micropython.mk` and, if asked, the qstrdefs header
/// into `dir`, creating it when needed. Returns the written paths.
///
/// Fails with [`OutputError::ModuleExists`] if any of the files is already
/// present; nothing is written in that case.
pub fn write_module(
    dir: &Path,
    unit: &GeneratedUnit,
    with_qstrdefs: bool,
) -> OutputResult<Vec<PathBuf>> {
    let makefile = if with_qstrdefs {
        unit.makefile_with_qstrdefs()
    } else {
        unit.makefile.clone()
    };
    let mut files = vec![
        (code_path(dir, &unit.module_name), unit.code.as_str()),
        (makefile_path(dir), makefile.as_str()),
    ];
    if with_qstrdefs {
        files.push((qstrdefs_path(dir, &unit.module_name), unit.qstrdefs.as_str()));
    }
    if files.iter().any(|(path, _)| path.exists()) {
        return Err(OutputError::ModuleExists(dir.to_path_buf()));
    }

    let created = outermost_missing(dir);
    fs::create_dir_all(dir).map_err(|e| OutputError::io(dir, e))?;

    let result = stage_and_persist(dir, &files);
    if result.is_err() {
        if let Some(top) = &created {
            remove_created_dirs(dir, top);
        }
    }
    result
}

/// The outermost ancestor of `dir` (or `dir` itself) that does not exist yet.
fn outermost_missing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !p.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Remove the empty directories from `dir` up to and including `top`.
fn remove_created_dirs(dir: &Path, top: &Path) {
    for path in dir.ancestors() {
        if fs::remove_dir(path).is_err() || path == top {
            break;
        }
    }
}

fn stage_and_persist(dir: &Path, files: &[(PathBuf, &str)]) -> OutputResult<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, text) in files {
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| OutputError::io(dir, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| OutputError::io(tmp.path(), e))?;
        staged.push((tmp, path));
    }

    // unpersisted temporaries are deleted on drop
    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (tmp, path) in staged {
        if let Err(e) = tmp.persist_noclobber(path) {
            for done in &written {
                let _ = fs::remove_file(done);
            }
            return Err(if e.error.kind() == io::ErrorKind::AlreadyExists {
                OutputError::ModuleExists(dir.to_path_buf())
            } else {
                OutputError::io(path, e.error)
            });
        }
        written.push(path.clone());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let dir = Path::new("out/board");
        assert_eq!(makefile_path(dir), Path::new("out/board/micropython.mk"));
        assert_eq!(code_path(dir, "board"), Path::new("out/board/board.c"));
        assert_eq!(
            qstrdefs_path(dir, "board"),
            Path::new("out/board/qstrdefs.board.h")
        );
    }

    #[test]
    fn test_persist_failure_removes_earlier_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let first = dir.join("board.c");
        let second = dir.join("micropython.mk");
        fs::write(&second, "# hand written\n").unwrap();

        let files = vec![(first.clone(), "int x;\n"), (second.clone(), "SRC_USERMOD +=\n")];
        let err = stage_and_persist(dir, &files).unwrap_err();
        assert!(matches!(err, OutputError::ModuleExists(_)));
        assert!(!first.exists());
        assert_eq!(fs::read_to_string(&second).unwrap(), "# hand written\n");
        assert_eq!(fs::read_dir(dir).unwrap().count(), 1);
    }

    #[test]
    fn test_outermost_missing_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b").join("mod");
        assert_eq!(outermost_missing(&dir), Some(tmp.path().join("a")));
        assert_eq!(outermost_missing(tmp.path()), None);
    }

    #[test]
    fn test_remove_created_dirs_stops_at_top() {
        let tmp = tempfile::tempdir().unwrap();
        let top = tmp.path().join("a");
        let dir = top.join("b").join("mod");
        fs::create_dir_all(&dir).unwrap();

        remove_created_dirs(&dir, &top);
        assert!(!top.exists());
        assert!(tmp.path().exists());
    }

    #[test]
    fn test_remove_created_dirs_keeps_non_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let top = tmp.path().join("a");
        let dir = top.join("mod");
        fs::create_dir_all(&dir).unwrap();
        fs::write(top.join("keep.txt"), "x").unwrap();

        remove_created_dirs(&dir, &top);
        assert!(!dir.exists());
        assert!(top.join("keep.txt").exists());
    }

    #[test]
    fn test_error_codes() {
        let exists = OutputError::ModuleExists(PathBuf::from("board"));
        assert_eq!(exists.code(), ErrorCode::MODULE_EXISTS);
        assert!(exists.to_string().contains("--clear"));

        let io_err = OutputError::io(
            Path::new("board/board.c"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let diag = io_err.to_diagnostic();
        assert_eq!(diag.code, ErrorCode::OUTPUT_IO);
        assert_eq!(diag.file, "board/board.c");
    }
}
