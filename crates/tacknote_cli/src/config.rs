//! Data and log directory resolution.
//!
//! # Responsibility
//! - Resolve where the database and log files live.
//! - Honor an explicit override before falling back to platform defaults.

use std::path::PathBuf;

const APP_DIR_NAME: &str = "tacknote";
const DB_FILE_NAME: &str = "tacknote.db";

/// Resolved filesystem layout for one app instance.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolves paths from an optional override directory.
    ///
    /// Falls back to the platform data directory, then to a per-user temp
    /// directory so the app still works in stripped-down environments.
    pub fn resolve(data_dir_override: Option<PathBuf>) -> Self {
        let data_dir = data_dir_override
            .or_else(|| dirs::data_local_dir().map(|base| base.join(APP_DIR_NAME)))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME));

        let db_path = data_dir.join(DB_FILE_NAME);
        let log_dir = data_dir.join("logs");
        Self {
            data_dir,
            db_path,
            log_dir,
        }
    }

    /// Creates the data directory tree when missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AppPaths;
    use std::path::PathBuf;

    #[test]
    fn override_directory_wins() {
        let paths = AppPaths::resolve(Some(PathBuf::from("/tmp/tacknote-test")));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/tacknote-test"));
        assert_eq!(paths.db_path, PathBuf::from("/tmp/tacknote-test/tacknote.db"));
        assert_eq!(paths.log_dir, PathBuf::from("/tmp/tacknote-test/logs"));
    }

    #[test]
    fn default_resolution_produces_absolute_paths() {
        let paths = AppPaths::resolve(None);
        assert!(paths.data_dir.is_absolute());
        assert!(paths.db_path.ends_with("tacknote.db"));
    }
}
