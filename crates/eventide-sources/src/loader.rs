//! Source definition loading from TOML files.
//!
//! Definitions live one per file (`<id>.toml`) under a directory tree such as
//! `source-definitions/music/city-arts.toml`.

use crate::{
    definition::SourceDefinition,
    error::{Result, SourceError},
};
use eventide_core::SourceId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for source definitions from TOML files.
pub struct SourceLoader {
    /// Base directory containing source definitions
    definitions_dir: PathBuf,
}

impl SourceLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(SourceError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Looks for `source-definitions/` at the workspace root, falling back to
    /// the current directory.
    ///
    /// # Errors
    /// Returns error if the default directory doesn't exist.
    pub fn with_default_dir() -> Result<Self> {
        let mut current_dir = std::env::current_dir()?;

        loop {
            let cargo_toml = current_dir.join("Cargo.toml");
            if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
                if contents.contains("[workspace]") {
                    return Self::new(current_dir.join("source-definitions"));
                }
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Self::new(PathBuf::from("source-definitions"))
    }

    /// Directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Load a single source definition by ID.
    ///
    /// # Errors
    /// Returns error if the definition file doesn't exist, can't be read, or is invalid.
    pub fn load(&self, source_id: &SourceId) -> Result<SourceDefinition> {
        let filename = format!("{}.toml", source_id.as_str());

        let Some(path) = Self::find_file_recursive(&self.definitions_dir, &filename)? else {
            return Err(SourceError::NotFound {
                source_id: source_id.to_string(),
            });
        };

        let definition = Self::load_from_path(&path)?;
        definition.validate()?;

        if definition.id() != source_id {
            return Err(SourceError::ValidationError {
                source_id: source_id.to_string(),
                reason: format!("file declares id {}", definition.id()),
            });
        }

        debug!(source_id = %source_id, name = %definition.source.name, "loaded source definition");

        Ok(definition)
    }

    /// Load all source definitions from the definitions directory.
    ///
    /// Unreadable or invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<SourceDefinition>> {
        let mut definitions = Vec::new();

        Self::walk_and_load_recursive(&self.definitions_dir, &mut definitions)?;
        definitions.sort_by(|a, b| a.id().cmp(b.id()));

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded source definitions"
        );

        Ok(definitions)
    }

    fn walk_and_load_recursive(dir: &Path, definitions: &mut Vec<SourceDefinition>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                Self::walk_and_load_recursive(&path, definitions)?;
                continue;
            }

            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }

            match Self::load_from_path(&path).and_then(|d| d.validate().map(|()| d)) {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping source definition");
                }
            }
        }

        Ok(())
    }

    fn find_file_recursive(dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                if let Some(found) = Self::find_file_recursive(&path, filename)? {
                    return Ok(Some(found));
                }
            } else if path.file_name().and_then(|s| s.to_str()) == Some(filename) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    fn load_from_path(path: &Path) -> Result<SourceDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| SourceError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        toml::from_str(&contents).map_err(|e| SourceError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::SourceType;
    use tempfile::TempDir;

    fn write_definition(dir: &Path, category: &str, id: &str) -> PathBuf {
        let category_dir = dir.join(category);
        std::fs::create_dir_all(&category_dir).expect("create category dir");

        let path = category_dir.join(format!("{id}.toml"));
        let content = format!(
            r#"
[source]
id = "{id}"
name = "Test Source {id}"
url = "https://{id}.example.org/events"
source_type = "website"
category = "{category}"

[scrape.selectors]
event_container = ".event"
title = "h2"
"#
        );
        std::fs::write(&path, content).expect("write definition");
        path
    }

    #[test]
    fn test_loader_new_with_missing_dir() {
        assert!(matches!(
            SourceLoader::new("/nonexistent/source-definitions"),
            Err(SourceError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_load_single_source() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write_definition(temp_dir.path(), "music", "city-arts");

        let loader = SourceLoader::new(temp_dir.path()).expect("create loader");
        let id = SourceId::new("city-arts").expect("valid id");
        let definition = loader.load(&id).expect("load definition");

        assert_eq!(definition.id(), &id);
        assert_eq!(definition.source.source_type, SourceType::Website);
        assert_eq!(definition.source.category.as_deref(), Some("music"));
    }

    #[test]
    fn test_load_missing_source() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = SourceLoader::new(temp_dir.path()).expect("create loader");
        let id = SourceId::new("nowhere").expect("valid id");
        assert!(matches!(loader.load(&id), Err(SourceError::NotFound { .. })));
    }

    #[test]
    fn test_load_all_walks_subdirectories_and_skips_invalid() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write_definition(temp_dir.path(), "music", "city-arts");
        write_definition(temp_dir.path(), "food", "market-hall");
        write_definition(&temp_dir.path().join("nested"), "film", "old-cinema");
        std::fs::write(temp_dir.path().join("broken.toml"), "[source\nid=").expect("write broken");
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").expect("write notes");

        let loader = SourceLoader::new(temp_dir.path()).expect("create loader");
        let definitions = loader.load_all().expect("load all");

        let ids: Vec<&str> = definitions.iter().map(|d| d.id().as_str()).collect();
        assert_eq!(ids, vec!["city-arts", "market-hall", "old-cinema"]);
    }
}
