use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    error::HistoryError,
    records::{ModelVersionDescriptor, VersionSeed},
};

/// One descriptor per model, persisted as a single JSON document.
///
/// The serving path only seeds missing entries and reads; it never rewrites an existing
/// descriptor.
#[derive(Debug)]
pub struct ModelVersionRegistry {
    path: Option<PathBuf>,
    entries: RwLock<IndexMap<String, ModelVersionDescriptor>>,
}

impl ModelVersionRegistry {
    /// Opens the registry file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let entries = if path.exists() {
            let data = fs::read(&path)?;
            let list: Vec<ModelVersionDescriptor> = serde_json::from_slice(&data)?;
            list.into_iter()
                .map(|entry| (entry.model_name.clone(), entry))
                .collect()
        } else {
            IndexMap::new()
        };
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// Registry that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates descriptors for models that have none. Existing entries are left as they
    /// are. Returns the number of descriptors created.
    pub fn ensure(
        &self,
        seeds: impl IntoIterator<Item = VersionSeed>,
    ) -> Result<usize, HistoryError> {
        let mut entries = self.entries.write();
        let mut created = 0;
        for seed in seeds {
            if entries.contains_key(&seed.model_name) {
                continue;
            }
            let descriptor = seed.into_descriptor();
            entries.insert(descriptor.model_name.clone(), descriptor);
            created += 1;
        }
        if created > 0 {
            self.persist(&entries)?;
        }
        Ok(created)
    }

    /// Descriptor for one model.
    #[must_use]
    pub fn get(&self, model_name: &str) -> Option<ModelVersionDescriptor> {
        self.entries.read().get(model_name).cloned()
    }

    /// Every descriptor in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ModelVersionDescriptor> {
        self.entries.read().values().cloned().collect()
    }

    fn persist(&self, entries: &IndexMap<String, ModelVersionDescriptor>) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let list: Vec<&ModelVersionDescriptor> = entries.values().collect();
        let data = serde_json::to_vec_pretty(&list)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed(name: &str, version: &str) -> VersionSeed {
        VersionSeed {
            model_name: name.into(),
            version: version.into(),
            description: Some("Random Forest".into()),
            accuracy: Some(0.95),
        }
    }

    #[test]
    fn ensure_only_creates_missing_entries() {
        let registry = ModelVersionRegistry::in_memory();
        assert_eq!(registry.ensure([seed("salary", "v1.0")]).unwrap(), 1);
        assert_eq!(
            registry
                .ensure([seed("salary", "v2.0"), seed("stock", "v1.0")])
                .unwrap(),
            1
        );
        assert_eq!(registry.get("salary").unwrap().current_version, "v1.0");
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn persisted_registry_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry/model_versions.json");
        {
            let registry = ModelVersionRegistry::open(&path).unwrap();
            registry.ensure([seed("house_price", "v1.0")]).unwrap();
        }
        let reopened = ModelVersionRegistry::open(&path).unwrap();
        let descriptor = reopened.get("house_price").unwrap();
        assert_eq!(descriptor.accuracy, Some(0.95));
        assert_eq!(descriptor.created_at, descriptor.updated_at);
        assert_eq!(reopened.ensure([seed("house_price", "v9")]).unwrap(), 0);
    }
}
