//! docsearch-vector
//!
//! The LanceDB documents table: inserts with store-assigned ids and insertion
//! sequence numbers, ordered scans, native cosine search and the index
//! capability probe.
use arrow_array::{RecordBatch, RecordBatchIterator};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;

use docsearch_core::types::{Document, IndexState, NewDocument, ScoredDocument};
use docsearch_core::StoreError;

pub mod index_build;
pub mod records;
pub mod schema;
pub mod table;

pub use index_build::{compute_ivfpq_params, IvfPqParams};
pub use records::StoredRow;

const ID_HEX_LEN: usize = 24;

/// Translates LanceDB failures into store error categories.
pub fn map_lance_error(e: lancedb::Error) -> StoreError {
    match &e {
        lancedb::Error::InvalidInput { .. } => StoreError::MalformedQuery(e.to_string()),
        lancedb::Error::ObjectStore { .. } | lancedb::Error::CreateDir { .. } | lancedb::Error::DatabaseNotFound { .. } => {
            StoreError::Connection(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

pub fn document_id(doc: &NewDocument, seq: i64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(doc.metadata.created_at.to_rfc3339().as_bytes());
    hasher.update(doc.title.as_bytes());
    hasher.update(&[0]);
    hasher.update(doc.body.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..ID_HEX_LEN].to_string()
}

pub struct LanceTable {
    _conn: Connection,
    table: Table,
    name: String,
    dim: i32,
    next_seq: tokio::sync::Mutex<i64>,
}

impl LanceTable {
    /// Opens (creating if needed) table `name` under `uri`. An existing table must
    /// have the same vector dimensionality.
    pub async fn open(uri: &str, name: &str, dim: usize) -> anyhow::Result<Self> {
        let dim = i32::try_from(dim)?;
        let conn = table::open_db(uri).await?;
        table::ensure_table(&conn, name, schema::build_arrow_schema(dim)).await?;
        let tbl = conn.open_table(name).execute().await?;
        if let Some(existing) = schema::vector_dim(tbl.schema().await?.as_ref()) {
            if existing != dim {
                anyhow::bail!("table '{name}' stores {existing}-dimensional vectors but embedding.dim is {dim}");
            }
        }
        let next = max_seq(&tbl).await?.map_or(0, |s| s + 1);
        tracing::debug!(uri, table = name, next_seq = next, "opened documents table");
        Ok(Self { _conn: conn, table: tbl, name: name.to_string(), dim, next_seq: tokio::sync::Mutex::new(next) })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn dim(&self) -> usize { self.dim as usize }

    /// Assigns id and sequence number, appends the row and returns the stored document.
    pub async fn insert(&self, new: NewDocument) -> Result<Document, StoreError> {
        let mut next = self.next_seq.lock().await;
        let seq = *next;
        let id = document_id(&new, seq);
        let row = StoredRow { seq, document: new.into_document(id) };
        let batch = records::documents_to_record_batch(std::slice::from_ref(&row), self.dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.table.add(reader).execute().await.map_err(map_lance_error)?;
        *next += 1;
        tracing::debug!(id = %row.document.id, seq, "document inserted");
        Ok(row.document)
    }

    /// Removes the row with `id`. Deleting an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let predicate = format!("id = '{}'", id.replace('\'', "''"));
        self.table.delete(&predicate).await.map_err(map_lance_error)?;
        tracing::debug!(id, table = %self.name, "document deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.table.count_rows(None).await.map_err(map_lance_error)
    }

    /// Every row matching `filter`, in insertion order.
    pub async fn scan(&self, filter: Option<&str>) -> Result<Vec<StoredRow>, StoreError> {
        let mut query = self.table.query();
        if let Some(f) = filter {
            query = query.only_if(f);
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(map_lance_error)?
            .try_collect()
            .await
            .map_err(map_lance_error)?;
        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(records::record_batch_to_rows(batch)?.into_iter().map(|(row, _)| row));
        }
        rows.sort_by_key(|r| r.seq);
        Ok(rows)
    }

    pub async fn scan_with_vectors(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.scan(Some("vector IS NOT NULL")).await?.into_iter().map(|r| r.document).collect())
    }

    /// Documents for `ids`, in the order given. Unknown ids are skipped.
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(", ");
        let mut by_id: HashMap<String, Document> = self
            .scan(Some(&format!("id IN ({list})")))
            .await?
            .into_iter()
            .map(|r| (r.document.id.clone(), r.document))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Native cosine top-`k`. `candidates / k` becomes the refine factor.
    pub async fn vector_search(&self, vector: &[f32], k: usize, candidates: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        if vector.len() != self.dim() {
            return Err(StoreError::MalformedQuery(format!("query vector has {} dimensions, expected {}", vector.len(), self.dim)));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let refine = u32::try_from((candidates / k).max(1)).unwrap_or(u32::MAX);
        let batches: Vec<RecordBatch> = self
            .table
            .vector_search(vector.to_vec())
            .map_err(map_lance_error)?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .only_if("vector IS NOT NULL")
            .limit(k)
            .refine_factor(refine)
            .execute()
            .await
            .map_err(map_lance_error)?
            .try_collect()
            .await
            .map_err(map_lance_error)?;
        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(records::record_batch_to_rows(batch)?);
        }
        rows.sort_by_key(|(r, _)| r.seq);
        let mut scored: Vec<(i64, ScoredDocument)> = rows
            .into_iter()
            .map(|(row, distance)| (row.seq, ScoredDocument::new(row.document, 1.0 - distance.unwrap_or(1.0))))
            .collect();
        scored.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    pub async fn probe(&self, index_name: &str) -> Result<IndexState, StoreError> {
        let indices = match self.table.list_indices().await {
            Ok(list) => list,
            Err(lancedb::Error::NotSupported { .. } | lancedb::Error::TableNotFound { .. }) => return Ok(IndexState::Absent),
            Err(e) => return Err(map_lance_error(e)),
        };
        if !indices.iter().any(|i| i.name == index_name) {
            return Ok(IndexState::Absent);
        }
        match self.table.index_stats(index_name).await {
            Ok(Some(stats)) if stats.num_indexed_rows > 0 => Ok(IndexState::Present),
            Ok(_) => Ok(IndexState::Building),
            Err(lancedb::Error::NotSupported { .. }) => Ok(IndexState::Absent),
            Err(e) => Err(map_lance_error(e)),
        }
    }

    pub async fn build_vector_index(&self, index_name: &str) -> anyhow::Result<IvfPqParams> {
        index_build::build_ivfpq_index(&self.table, index_name, self.dim()).await
    }
}

async fn max_seq(table: &Table) -> anyhow::Result<Option<i64>> {
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;

    let mut max = None;
    let mut stream = table.query().select(Select::columns(&["seq"])).execute().await?;
    while let Some(batch) = stream.try_next().await? {
        if let Some(col) = batch.column_by_name("seq").and_then(|c| c.as_primitive_opt::<Int64Type>()) {
            if let Some(m) = col.iter().flatten().max() {
                max = Some(max.map_or(m, |cur: i64| cur.max(m)));
            }
        }
    }
    Ok(max)
}
