//! LanceDB connection and housekeeping helpers.
//!
//! Provides database open functions, an ensure helper for tables, and a small
//! key/value metadata table recording which embedder wrote each collection.

use anyhow::Result;
use lancedb::{connect, Connection};
use lancedb::query::{QueryBase, ExecutableQuery};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::Schema;
use std::sync::Arc;

use crate::schema::build_meta_schema;

/// Internal table; its leading underscore keeps it out of the collection namespace.
pub const META_TABLE: &str = "_ragdb_meta";

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

/// Create an empty table with `schema` unless it already exists. Returns whether it was created.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<bool> {
    if table_exists(conn, name).await? {
        return Ok(false);
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(true)
}

/// Drop `name` if present. Not-found is `Ok(false)`; other failures propagate.
pub async fn drop_table_if_exists(conn: &Connection, name: &str) -> Result<bool> {
    if !table_exists(conn, name).await? {
        return Ok(false);
    }
    match conn.drop_table(name, &[]).await {
        Ok(()) => Ok(true),
        Err(lancedb::Error::TableNotFound { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub async fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, META_TABLE, build_meta_schema()).await?;
    let t = conn.open_table(META_TABLE).execute().await?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // Upsert behavior via merge_insert: key is unique
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, META_TABLE).await? { return Ok(None); }
    let t = conn.open_table(META_TABLE).execute().await?;
    let mut stream = t.query().only_if(format!("key = {}", quote_literal(key))).execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        if batch.num_rows() == 0 { continue; }
        let val = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow::anyhow!("meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

pub async fn delete_meta(conn: &Connection, key: &str) -> Result<()> {
    if !table_exists(conn, META_TABLE).await? { return Ok(()); }
    let t = conn.open_table(META_TABLE).execute().await?;
    t.delete(&format!("key = {}", quote_literal(key))).await?;
    Ok(())
}
