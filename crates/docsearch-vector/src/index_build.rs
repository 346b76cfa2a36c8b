//! IVF-PQ index training over the `vector` column.
//!
//! Parameters follow the number of rows that actually carry an embedding:
//! roughly √n partitions (at least 1, fewer than n) and 16 sub-vectors for
//! 384-dimensional embeddings.
use anyhow::{Result, bail};
use arrow_array::Array;
use lancedb::index::{vector::IvfPqIndexBuilder, Index};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};

/// Below this many embedded rows PQ training has too little data to fit its codebooks.
pub const MIN_TRAINING_ROWS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub num_partitions: usize,
    pub num_sub_vectors: usize,
}

pub async fn count_ready_vectors(table: &Table) -> Result<usize> {
    let mut cnt = 0usize;
    let mut stream = table.query().select(Select::columns(&["vector"])).execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        if let Some(arr) = batch.column_by_name("vector") {
            cnt += arr.len() - arr.null_count();
        }
    }
    Ok(cnt)
}

pub fn compute_ivfpq_params(total_ready: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_ready as f64).sqrt().round() as usize;
    let num_partitions = if total_ready > 1 { sqrt_n.clamp(1, total_ready - 1) } else { 1 };
    let num_sub_vectors = if dim >= 1024 { 32 } else if dim % 16 == 0 { 16 } else { largest_divisor_at_most(dim, 16) };
    IvfPqParams { num_partitions, num_sub_vectors }
}

fn largest_divisor_at_most(n: usize, cap: usize) -> usize {
    (1..=cap.min(n.max(1))).rev().find(|d| n % d == 0).unwrap_or(1)
}

/// Trains and names a cosine IVF-PQ index. Replaces an existing index of the same name.
pub async fn build_ivfpq_index(table: &Table, index_name: &str, dim: usize) -> Result<IvfPqParams> {
    let ready = count_ready_vectors(table).await?;
    if ready < MIN_TRAINING_ROWS {
        bail!("only {ready} documents carry embeddings; at least {MIN_TRAINING_ROWS} are needed to train the vector index");
    }
    let params = compute_ivfpq_params(ready, dim);
    tracing::info!(index = index_name, ready, partitions = params.num_partitions, sub_vectors = params.num_sub_vectors, "training vector index");
    table
        .create_index(
            &["vector"],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(params.num_partitions as u32)
                    .num_sub_vectors(params.num_sub_vectors as u32),
            ),
        )
        .name(index_name.to_string())
        .replace(true)
        .execute()
        .await?;
    Ok(params)
}
