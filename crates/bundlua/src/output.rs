//! Where a bundle is written
//!
//! An explicit output path always wins. Otherwise the bundle goes into the
//! output directory, named after the trimmed contents of the title file when that
//! file exists and is not blank, or after the default output name.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;

pub const DEFAULT_OUTPUT_DIR: &str = "build";
pub const DEFAULT_TITLE_FILE: &str = "title.txt";
pub const DEFAULT_OUTPUT_NAME: &str = "bundle.lua";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub explicit: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub title_file: Option<PathBuf>,
    pub default_name: String,
}

impl OutputLocation {
    /// Defaults relative to a project directory
    pub fn new(project_dir: &Path) -> Self {
        Self {
            explicit: None,
            output_dir: project_dir.join(DEFAULT_OUTPUT_DIR),
            title_file: Some(project_dir.join(DEFAULT_TITLE_FILE)),
            default_name: DEFAULT_OUTPUT_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_explicit(mut self, explicit: Option<PathBuf>) -> Self {
        self.explicit = explicit;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    #[must_use]
    pub fn with_title_file(mut self, title_file: Option<PathBuf>) -> Self {
        self.title_file = title_file;
        self
    }

    #[must_use]
    pub fn with_default_name(mut self, default_name: impl Into<String>) -> Self {
        self.default_name = default_name.into();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(explicit) = &self.explicit {
            return explicit.clone();
        }
        let file_name = self
            .title_file
            .as_deref()
            .and_then(read_title)
            .unwrap_or_else(|| self.default_name.clone());
        self.output_dir.join(file_name)
    }
}

/// Trimmed contents of a title file, or `None` when it is missing or blank
pub fn read_title(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let title = content.trim();
            if title.is_empty() {
                debug!("Title file {} is empty", path.display());
                None
            } else {
                Some(title.to_string())
            }
        }
        Err(err) => {
            debug!("No usable title file at {}: {err}", path.display());
            None
        }
    }
}

/// Create the directories an output file will live in
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_explicit_output_wins() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("title.txt"), "Named.lua")?;
        let location = OutputLocation::new(temp_dir.path())
            .with_explicit(Some(PathBuf::from("/tmp/out/x.lua")));
        assert_eq!(location.resolve(), PathBuf::from("/tmp/out/x.lua"));
        Ok(())
    }

    #[test]
    fn test_title_file_names_output() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("title.txt"), "  MyLib.lua\n")?;
        let location = OutputLocation::new(temp_dir.path());
        assert_eq!(location.resolve(), temp_dir.path().join("build/MyLib.lua"));
        Ok(())
    }

    #[test]
    fn test_missing_or_blank_title_falls_back() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let location = OutputLocation::new(temp_dir.path());
        assert_eq!(location.resolve(), temp_dir.path().join("build/bundle.lua"));

        fs::write(temp_dir.path().join("title.txt"), " \n")?;
        assert_eq!(location.resolve(), temp_dir.path().join("build/bundle.lua"));

        let renamed = location
            .with_title_file(None)
            .with_default_name("game.lua")
            .with_output_dir(temp_dir.path().join("dist"));
        assert_eq!(renamed.resolve(), temp_dir.path().join("dist/game.lua"));
        Ok(())
    }

    #[test]
    fn test_ensure_parent_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = temp_dir.path().join("a/b/out.lua");
        ensure_parent_dir(&target)?;
        assert!(temp_dir.path().join("a/b").is_dir());
        ensure_parent_dir(Path::new("bare.lua"))?;
        Ok(())
    }
}
