//! IVF-PQ training for large chunk tables. Small tables stay on exact scan.
use anyhow::Result;
use lancedb::index::{vector::IvfPqIndexBuilder, Index};
use lancedb::{DistanceType, Table};
use tracing::info;

use crate::schema::VECTOR_COLUMN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
}

pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_rows as f64).sqrt() as usize;
    let mut nlist = std::cmp::max(256, 2 * sqrt_n);
    nlist = std::cmp::min(nlist, 65536);
    // Clamp nlist to be less than total_rows for tiny datasets
    nlist = if total_rows > 1 { std::cmp::min(nlist, total_rows - 1) } else { 1 };
    let preferred = if dim >= 1024 { 32 } else { 16 };
    let m = [preferred, 16, 8, 4, 2, 1].into_iter().find(|m| *m <= dim && dim % m == 0).unwrap_or(1);
    IvfPqParams { nlist, m }
}

pub async fn build_ivfpq_index(table: &Table, params: &IvfPqParams) -> Result<()> {
    table
        .create_index(
            &[VECTOR_COLUMN],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(u32::try_from(params.nlist)?)
                    .num_sub_vectors(u32::try_from(params.m)?),
            ),
        )
        .execute()
        .await?;
    info!(nlist = params.nlist, m = params.m, "trained IVF-PQ index");
    Ok(())
}
