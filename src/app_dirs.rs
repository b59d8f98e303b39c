use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
#[derive(Debug, Clone)]
pub struct AppDirs {
    data_dir: PathBuf,
}

impl AppDirs {
    /// `$HOME/.local/state/walktest`, falling back to the platform data dir.
    pub fn default_data_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("walktest"),
            )
        } else {
            ProjectDirs::from("", "", "walktest").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn resolve(override_dir: Option<&Path>) -> Self {
        let data_dir = override_dir
            .map(Path::to_path_buf)
            .or_else(Self::default_data_dir)
            .unwrap_or_else(|| PathBuf::from("walktest_data"));
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn results_json(&self) -> PathBuf {
        self.data_dir.join("walk_results.json")
    }

    pub fn results_db(&self) -> PathBuf {
        self.data_dir.join("walk_results.db")
    }

    pub fn profile(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_dir_wins() {
        let dirs = AppDirs::resolve(Some(Path::new("/tmp/walks")));
        assert_eq!(dirs.data_dir(), Path::new("/tmp/walks"));
        assert_eq!(dirs.results_json(), Path::new("/tmp/walks/walk_results.json"));
        assert_eq!(dirs.results_db(), Path::new("/tmp/walks/walk_results.db"));
        assert_eq!(dirs.profile(), Path::new("/tmp/walks/profile.json"));
    }
}
