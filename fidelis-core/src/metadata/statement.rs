//! Metadata statements bundled with the relying party or loaded from disk.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use super::models::{Metadata, MetadataStatement};
use super::provider::MetadataProvider;
use crate::error::{FidelisError, Result};
use crate::registration::MetadataIdentifier;

#[derive(Debug, Clone, Default)]
pub struct StatementMetadataProvider {
    statements: Vec<MetadataStatement>,
}

impl StatementMetadataProvider {
    pub fn from_statements(statements: impl IntoIterator<Item = MetadataStatement>) -> Self {
        Self {
            statements: statements.into_iter().collect(),
        }
    }

    /// Loads a statement file, a file holding a JSON array of statements, or
    /// every `*.json` file of a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut provider = Self::default();
        provider.add_path(path.as_ref())?;
        Ok(provider)
    }

    pub fn add_path(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            let mut files = fs::read_dir(path)
                .map_err(|e| read_error(path, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect::<Vec<_>>();
            files.sort();
            for file in files {
                self.add_file(&file)?;
            }
        } else {
            self.add_file(path)?;
        }
        info!(path = %path.display(), statements = self.statements.len(), "Loaded metadata statements");
        Ok(())
    }

    fn add_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| invalid(path, e))?;
        match value {
            Value::Array(items) => {
                for item in items {
                    self.statements
                        .push(serde_json::from_value(item).map_err(|e| invalid(path, e))?);
                }
            }
            other => self
                .statements
                .push(serde_json::from_value(other).map_err(|e| invalid(path, e))?),
        }
        debug!(path = %path.display(), "Read metadata file");
        Ok(())
    }

    pub fn statements(&self) -> &[MetadataStatement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn read_error(path: &Path, e: std::io::Error) -> FidelisError {
    FidelisError::configuration(format!("Failed to read {}: {e}", path.display()))
}

fn invalid(path: &Path, e: serde_json::Error) -> FidelisError {
    FidelisError::parse(format!("Invalid metadata statement in {}: {e}", path.display()))
}

impl MetadataProvider for StatementMetadataProvider {
    fn name(&self) -> &str {
        "statements"
    }

    fn lookup(&self, identifier: &MetadataIdentifier) -> Result<Option<Metadata>> {
        self.statements
            .iter()
            .find(|statement| statement.matches(identifier))
            .map(|statement| Metadata::from_statement(statement.clone(), Vec::new()))
            .transpose()
    }
}
