//! Single-file catalog store.
//!
//! The whole catalog is one JSON document (`max_used_table_id` plus every
//! table schema keyed by name). Each mutation rewrites it to a sibling temp
//! file, syncs, and renames over the original, so a crash leaves either the
//! old or the new image on disk. A `.lock` file next to the catalog keeps a
//! second process from opening it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::lock::CatalogLock;
use super::{CatalogImage, SchemaStore};
use crate::error::StoreError;
use crate::types::{AlterTableSchema, TableId, TableSchema};

pub struct FileSchemaStore {
    path: PathBuf,
    image: Mutex<CatalogImage>,
    _lock: CatalogLock,
}

impl FileSchemaStore {
    /// Create a new catalog file. Fails if one already exists at `path`.
    pub fn create(path: impl AsRef<Path>, max_used_table_id: TableId) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let lock = CatalogLock::try_exclusive(&path.with_extension("lock"))?;
        if path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("catalog file already exists: {}", path.display()),
            )));
        }
        let image = CatalogImage::new(max_used_table_id);
        write_image(path, &image)?;
        debug!(path = %path.display(), max_used_table_id, "catalog created");
        Ok(Self {
            path: path.to_path_buf(),
            image: Mutex::new(image),
            _lock: lock,
        })
    }

    /// Open an existing catalog file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let lock = CatalogLock::try_exclusive(&path.with_extension("lock"))?;
        let bytes = fs::read(path)?;
        let image: CatalogImage = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Corrupted(format!("failed to deserialize catalog: {e}"))
        })?;
        debug!(path = %path.display(), tables = image.tables.len(), "catalog opened");
        Ok(Self {
            path: path.to_path_buf(),
            image: Mutex::new(image),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the image and persist it; the in-memory image
    /// only changes once the file write succeeded.
    fn mutate(
        &self,
        f: impl FnOnce(&mut CatalogImage) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut image = self.image.lock();
        let mut next = image.clone();
        f(&mut next)?;
        write_image(&self.path, &next)?;
        *image = next;
        Ok(())
    }
}

fn write_image(path: &Path, image: &CatalogImage) -> Result<(), StoreError> {
    let json_bytes = serde_json::to_vec_pretty(image)
        .map_err(|e| StoreError::Corrupted(format!("failed to serialize catalog: {e}")))?;
    let tmp_path = path.with_extension("tmp");
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(&json_bytes)?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl SchemaStore for FileSchemaStore {
    fn get_max_used_table_id(&self) -> Result<TableId, StoreError> {
        Ok(self.image.lock().max_used_table_id)
    }

    fn set_max_used_table_id(&self, table_id: TableId) -> Result<(), StoreError> {
        self.mutate(|image| {
            image.max_used_table_id = table_id;
            Ok(())
        })
    }

    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.mutate(|image| image.insert(schema))
    }

    fn drop_table(&self, table_name: &str) -> Result<(), StoreError> {
        self.mutate(|image| image.remove(table_name).map(|_| ()))
    }

    fn get_table_id(&self, table_name: &str) -> Result<Option<TableId>, StoreError> {
        Ok(self
            .image
            .lock()
            .tables
            .get(table_name)
            .and_then(|t| t.table_id))
    }

    fn get_table_name(&self, table_id: TableId) -> Result<Option<String>, StoreError> {
        Ok(self.image.lock().name_of(table_id).map(str::to_string))
    }

    fn get_table_schema(&self, table_name: &str) -> Result<Option<TableSchema>, StoreError> {
        Ok(self.image.lock().tables.get(table_name).cloned())
    }

    fn alter_table(
        &self,
        alter: &AlterTableSchema,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.mutate(|image| image.alter(alter, expected_version))
    }

    fn modify_table_id(
        &self,
        schema: &TableSchema,
        new_table_id: TableId,
    ) -> Result<(), StoreError> {
        self.mutate(|image| image.modify_id(&schema.table_name, new_table_id))
    }
}
