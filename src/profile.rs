use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Free-text profile details, empty strings when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub height: String,
    pub weight: String,
    pub medical_conditions: String,
}

impl UserProfile {
    /// Avatar letter: first letter of the name, or `?`.
    pub fn initial(&self) -> char {
        self.name
            .trim()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }

    /// Labelled fields in display order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("Name", self.name.as_str()),
            ("Age", self.age.as_str()),
            ("Gender", self.gender.as_str()),
            ("Height", self.height.as_str()),
            ("Weight", self.weight.as_str()),
            ("Medical Conditions", self.medical_conditions.as_str()),
        ]
    }
}

pub trait ProfileStore {
    fn load(&self) -> UserProfile;
    fn save(&self, profile: &UserProfile) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self) -> UserProfile {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(profile) = serde_json::from_slice::<UserProfile>(&bytes) {
                return profile;
            }
        }
        UserProfile::default()
    }

    fn save(&self, profile: &UserProfile) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(profile)?;
        fs::write(&self.path, data)
    }
}
