use directories::ProjectDirs;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("quizguard"),
            )
        } else {
            ProjectDirs::from("", "", "quizguard")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn history_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("quizguard.log"))
    }

    /// Open `path` for appending, creating it and its parent directories.
    pub fn open_log(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn open_log_creates_parents_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("quizguard.log");

        writeln!(AppDirs::open_log(&path).unwrap(), "one").unwrap();
        writeln!(AppDirs::open_log(&path).unwrap(), "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn open_log_reports_unusable_paths() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        assert!(AppDirs::open_log(&blocker.join("quizguard.log")).is_err());
    }
}
