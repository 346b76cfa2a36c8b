//! Conversion between [`Document`]s and Arrow record batches.
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int64Type};
use arrow_array::{Array, FixedSizeListArray, Int64Array, RecordBatch, StringArray};
use std::sync::Arc;

use docsearch_core::types::{Document, DocumentMetadata};
use docsearch_core::StoreError;

use crate::schema::build_arrow_schema;

/// A document as stored, together with its insertion sequence number.
#[derive(Debug, Clone)]
pub struct StoredRow {
	pub seq: i64,
	pub document: Document,
}

pub fn documents_to_record_batch(rows: &[StoredRow], dim: i32) -> Result<RecordBatch, StoreError> {
	let schema = build_arrow_schema(dim);
	let mut ids = Vec::with_capacity(rows.len());
	let mut seqs = Vec::with_capacity(rows.len());
	let mut titles = Vec::with_capacity(rows.len());
	let mut bodies = Vec::with_capacity(rows.len());
	let mut tags = Vec::with_capacity(rows.len());
	let mut metadata = Vec::with_capacity(rows.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(rows.len());
	for row in rows {
		let doc = &row.document;
		ids.push(doc.id.clone());
		seqs.push(row.seq);
		titles.push(doc.title.clone());
		bodies.push(doc.body.clone());
		tags.push(serde_json::to_string(&doc.tags).map_err(|e| StoreError::Backend(e.to_string()))?);
		metadata.push(serde_json::to_string(&doc.metadata).map_err(|e| StoreError::Backend(e.to_string()))?);
		match &doc.embedding {
			Some(v) if !v.is_empty() => {
				if v.len() != dim as usize {
					return Err(StoreError::Backend(format!("embedding has {} dimensions, table expects {dim}", v.len())));
				}
				vectors.push(Some(v.iter().map(|&x| Some(x)).collect()));
			}
			_ => vectors.push(None),
		}
	}
	RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(Int64Array::from(seqs)),
		Arc::new(StringArray::from(titles)),
		Arc::new(StringArray::from(bodies)),
		Arc::new(StringArray::from(tags)),
		Arc::new(StringArray::from(metadata)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
	])
	.map_err(|e| StoreError::Backend(e.to_string()))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_string_opt::<i32>())
		.ok_or_else(|| StoreError::Backend(format!("column '{name}' missing or not a string")))
}

/// Decodes every row of `batch`. A `_distance` column, when present, is returned alongside.
pub fn record_batch_to_rows(batch: &RecordBatch) -> Result<Vec<(StoredRow, Option<f32>)>, StoreError> {
	let ids = string_column(batch, "id")?;
	let titles = string_column(batch, "title")?;
	let bodies = string_column(batch, "body")?;
	let tags = string_column(batch, "tags")?;
	let metadata = string_column(batch, "metadata")?;
	let seqs = batch
		.column_by_name("seq")
		.and_then(|c| c.as_primitive_opt::<Int64Type>())
		.ok_or_else(|| StoreError::Backend("column 'seq' missing".into()))?;
	let vectors = batch.column_by_name("vector").and_then(|c| c.as_fixed_size_list_opt());
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_primitive_opt::<Float32Type>());

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let embedding = match vectors {
			Some(fsl) if fsl.is_valid(i) => {
				let inner = fsl.value(i);
				Some(inner.as_primitive::<Float32Type>().values().to_vec())
			}
			_ => None,
		};
		let tag_list: Vec<String> = serde_json::from_str(tags.value(i)).map_err(|e| StoreError::Backend(format!("bad tags for {}: {e}", ids.value(i))))?;
		let meta: DocumentMetadata = serde_json::from_str(metadata.value(i)).map_err(|e| StoreError::Backend(format!("bad metadata for {}: {e}", ids.value(i))))?;
		let document = Document {
			id: ids.value(i).to_string(),
			title: titles.value(i).to_string(),
			body: bodies.value(i).to_string(),
			tags: tag_list,
			embedding,
			metadata: meta,
		};
		let distance = distances.filter(|d| d.is_valid(i)).map(|d| d.value(i));
		out.push((StoredRow { seq: seqs.value(i), document }, distance));
	}
	Ok(out)
}
