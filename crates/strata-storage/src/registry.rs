use std::sync::Arc;

use strata_driver::{FilesystemDriver, InMemoryDriver, StorageDriver};
use strata_types::RepositoryName;
use tracing::info;

use crate::blobs::BlobStore;
use crate::config::{DriverConfig, StorageConfig};
use crate::error::StorageResult;
use crate::layer::LayerStore;
use crate::paths::PathMapper;

/// Entry point tying a storage driver to a path layout.
///
/// A registry is cheap to clone; all clones share the same driver.
#[derive(Clone, Debug)]
pub struct Registry {
    driver: Arc<dyn StorageDriver>,
    paths: PathMapper,
    blobs: BlobStore,
    buffer_size: usize,
}

impl Registry {
    /// Build a registry over an existing driver.
    pub fn new(driver: Arc<dyn StorageDriver>, config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let paths = PathMapper::from_config(config);
        let blobs = BlobStore::new(driver.clone(), paths.clone());
        Ok(Self {
            driver,
            paths,
            blobs,
            buffer_size: config.buffer_size,
        })
    }

    /// Build the configured driver, then the registry over it.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let driver: Arc<dyn StorageDriver> = match &config.driver {
            DriverConfig::InMemory => Arc::new(InMemoryDriver::new()),
            DriverConfig::Filesystem { root } => Arc::new(FilesystemDriver::new(root)?),
        };
        info!(
            driver = driver.name(),
            root = %config.root_directory,
            version = %config.layout_version,
            "registry storage opened"
        );
        Self::new(driver, config)
    }

    /// Handle on one repository. Fails if the name is invalid.
    pub fn repository(&self, name: &str) -> StorageResult<Repository> {
        Ok(Repository {
            name: RepositoryName::new(name)?,
            driver: self.driver.clone(),
            paths: self.paths.clone(),
            blobs: self.blobs.clone(),
            buffer_size: self.buffer_size,
        })
    }

    /// The global blob store shared by all repositories.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// The storage driver everything is persisted through.
    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    /// The path layout in use.
    pub fn paths(&self) -> &PathMapper {
        &self.paths
    }
}

/// One repository namespace within a [`Registry`].
#[derive(Clone, Debug)]
pub struct Repository {
    pub(crate) name: RepositoryName,
    pub(crate) driver: Arc<dyn StorageDriver>,
    pub(crate) paths: PathMapper,
    pub(crate) blobs: BlobStore,
    pub(crate) buffer_size: usize,
}

impl Repository {
    /// Name of this repository.
    pub fn name(&self) -> &RepositoryName {
        &self.name
    }

    /// Layer operations scoped to this repository.
    pub fn layers(&self) -> LayerStore {
        LayerStore::new(self.clone())
    }
}
