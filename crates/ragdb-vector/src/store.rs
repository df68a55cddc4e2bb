//! Named, persisted vector collections under one root directory.
//!
//! Each collection is one Lance table (`<root>/<name>.lance`) searched under
//! cosine distance. The API is synchronous: every call runs to completion on
//! the calling thread, driving LanceDB on a runtime owned by the store. It must
//! not be called from inside another tokio runtime.

use lancedb::{Connection, Table};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::naming::{is_valid_collection_name, normalize_collection_name};
use ragdb_core::types::{CollectionStats, CollectionSummary};

use crate::schema::build_chunk_schema;
use crate::table;

/// Handle to an open collection.
#[derive(Clone)]
pub struct Collection {
    name: String,
    created: bool,
    table: Table,
}

impl Collection {
    pub fn name(&self) -> &str { &self.name }

    /// True when this call created the collection.
    pub fn created(&self) -> bool { self.created }

    pub(crate) fn table(&self) -> &Table { &self.table }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).field("created", &self.created).finish()
    }
}

pub struct CorpusStore {
    root: PathBuf,
    dim: usize,
    conn: Connection,
    rt: Runtime,
}

pub(crate) fn storage_err(e: anyhow::Error) -> Error {
    Error::Storage(format!("{e:#}"))
}

fn embedder_key(collection: &str) -> String {
    format!("embedder:{collection}")
}

/// Normalize a raw collection name, logging when it changes.
pub fn resolve_name(raw: &str) -> String {
    let name = normalize_collection_name(raw);
    if name != raw {
        info!(raw = %raw, normalized = %name, "collection name normalized");
    }
    name
}

impl CorpusStore {
    /// Open (creating if needed) the store rooted at `root`. `dim` is the
    /// vector width used for collections created through this store.
    pub fn open(root: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let dim_i32 = i32::try_from(dim).map_err(|_| Error::InvalidInput(format!("embedding dim {dim} too large")))?;
        if dim_i32 == 0 {
            return Err(Error::InvalidInput("embedding dim must be at least 1".into()));
        }
        let rt = Runtime::new()?;
        let conn = rt.block_on(table::open_db(&root.to_string_lossy())).map_err(storage_err)?;
        debug!(root = %root.display(), dim, "corpus store opened");
        Ok(Self { root, dim, conn, rt })
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn dim(&self) -> usize { self.dim }

    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.rt.block_on(fut)
    }


    /// Open an existing collection by already-normalized name.
    pub(crate) fn open_collection(&self, name: &str) -> Result<Option<Collection>> {
        self.block_on(async {
            if !table::table_exists(&self.conn, name).await? {
                return anyhow::Ok(None);
            }
            let table = self.conn.open_table(name).execute().await?;
            anyhow::Ok(Some(Collection { name: name.to_string(), created: false, table }))
        })
        .map_err(storage_err)
    }

    /// Look up a collection by raw name without creating it.
    pub fn get(&self, raw_name: &str) -> Result<Option<Collection>> {
        self.open_collection(&resolve_name(raw_name))
    }

    pub fn create_or_get(&self, raw_name: &str, overwrite: bool) -> Result<Collection> {
        let name = resolve_name(raw_name);
        if overwrite && self.delete_if_exists(&name)? {
            info!(collection = %name, "deleted existing collection before overwrite");
        }
        let schema = build_chunk_schema(self.dim as i32);
        let (created, table) = self
            .block_on(async {
                let created = table::ensure_table(&self.conn, &name, schema).await?;
                let table = self.conn.open_table(&name).execute().await?;
                anyhow::Ok((created, table))
            })
            .map_err(storage_err)?;
        if created {
            info!(collection = %name, "collection created");
        } else {
            debug!(collection = %name, "collection ready");
        }
        Ok(Collection { name, created, table })
    }

    /// Delete a collection. A missing collection is `Error::NotFound`.
    pub fn delete(&self, raw_name: &str) -> Result<()> {
        let name = resolve_name(raw_name);
        if self.delete_if_exists(&name)? {
            info!(collection = %name, "collection deleted");
            Ok(())
        } else {
            Err(Error::NotFound(name))
        }
    }

    /// Delete-if-exists: not-found is ignored, every other failure propagates.
    fn delete_if_exists(&self, name: &str) -> Result<bool> {
        let dropped = self.block_on(table::drop_table_if_exists(&self.conn, name)).map_err(storage_err)?;
        if dropped {
            self.block_on(table::delete_meta(&self.conn, &embedder_key(name))).map_err(storage_err)?;
        }
        Ok(dropped)
    }

    pub fn count(&self, collection: &Collection) -> Result<usize> {
        self.block_on(collection.table().count_rows(None)).map_err(Error::storage)
    }

    pub fn list(&self) -> Result<Vec<CollectionSummary>> {
        let mut names = self.block_on(self.conn.table_names().execute()).map_err(Error::storage)?;
        names.retain(|n| is_valid_collection_name(n));
        names.sort();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(collection) = self.open_collection(&name)? {
                let count = self.count(&collection)?;
                out.push(CollectionSummary { name, count });
            }
        }
        Ok(out)
    }

    /// Never fails: any lookup error reports the collection as missing.
    pub fn stats(&self, raw_name: &str) -> CollectionStats {
        let name = resolve_name(raw_name);
        let counted = self.open_collection(&name).and_then(|c| match c {
            Some(collection) => self.count(&collection).map(Some),
            None => Ok(None),
        });
        match counted {
            Ok(Some(count)) => CollectionStats { name, count, exists: true },
            Ok(None) => CollectionStats::missing(&name),
            Err(e) => {
                warn!(collection = %name, error = %e, "stats lookup failed");
                CollectionStats::missing(&name)
            }
        }
    }

    /// Embedder id recorded for a collection by the last successful ingest.
    pub fn recorded_embedder(&self, collection: &Collection) -> Result<Option<String>> {
        self.block_on(table::get_meta(&self.conn, &embedder_key(collection.name()))).map_err(storage_err)
    }

    pub(crate) fn record_embedder(&self, collection: &Collection, embedder_id: &str) -> Result<()> {
        self.block_on(table::set_meta(&self.conn, &embedder_key(collection.name()), embedder_id)).map_err(storage_err)
    }

    /// Fail with `EmbedderMismatch` when the collection was written by another embedder.
    pub fn ensure_embedder(&self, collection: &Collection, embedder_id: &str) -> Result<()> {
        match self.recorded_embedder(collection)? {
            Some(recorded) if recorded != embedder_id => Err(Error::EmbedderMismatch {
                collection: collection.name().to_string(),
                indexed_with: recorded,
                querying_with: embedder_id.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
