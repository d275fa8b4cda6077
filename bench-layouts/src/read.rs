//! Parallel read orchestrator: mirrors the writer. Each table of the active
//! variant is cluster-split across workers; every worker opens its own
//! reader handle and scans exactly its clusters, folding each value into a
//! checksum so the scan cannot be optimized away.

use std::hint::black_box;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Int16Type, Int32Type, UInt8Type, UInt32Type, UInt64Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_schema::DataType;
use tracing::{debug, error};

use crate::layout::LayoutVariant;
use crate::split::split_clusters;
use crate::store::TableReader;

/// Outcome of one full scan over every table of a variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanTotals {
    /// Sum of the workers' measured scan intervals.
    pub elapsed: Duration,
    /// Physical rows touched across all tables.
    pub rows: u64,
    /// Order-insensitive digest of every value read.
    pub checksum: u64,
}

/// Scans all tables of `variant` in `container` with `threads` workers per
/// table. A zero thread count is diagnosed and yields a zero result.
pub fn read_variant(
    variant: LayoutVariant,
    container: &Path,
    threads: usize,
) -> anyhow::Result<ScanTotals> {
    if threads == 0 {
        error!(variant = %variant, "rejecting read configuration: thread count must be positive");
        return Ok(ScanTotals::default());
    }

    let mut totals = ScanTotals::default();
    for table in variant.table_names() {
        let reader = TableReader::open(container, table)?;
        let chunks = split_clusters(&reader.clusters(), threads);
        drop(reader);

        let table_totals = thread::scope(|scope| {
            let mut workers = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                workers.push(scope.spawn(move || -> anyhow::Result<ScanTotals> {
                    // Independent handle; engine read handles are never shared.
                    let reader = TableReader::open(container, table)?;
                    let scan = reader.scan(chunk.clusters)?;
                    let mut rows = 0u64;
                    let mut checksum = 0u64;
                    let start = Instant::now();
                    for batch in scan {
                        let batch = batch?;
                        rows += batch.num_rows() as u64;
                        checksum = checksum.wrapping_add(black_box(touch_batch(&batch)));
                    }
                    Ok(ScanTotals {
                        elapsed: start.elapsed(),
                        rows,
                        checksum,
                    })
                }));
            }

            let mut totals = ScanTotals::default();
            for worker in workers {
                let part = worker
                    .join()
                    .map_err(|_| anyhow!("read worker panicked"))??;
                totals.elapsed += part.elapsed;
                totals.rows += part.rows;
                totals.checksum = totals.checksum.wrapping_add(part.checksum);
            }
            Ok::<_, anyhow::Error>(totals)
        })?;

        totals.elapsed += table_totals.elapsed;
        totals.rows += table_totals.rows;
        totals.checksum = totals.checksum.wrapping_add(table_totals.checksum);
    }

    debug!(variant = %variant, rows = totals.rows, "read pass complete");
    Ok(totals)
}

/// Folds every value of the batch into a digest, visiting nested layouts
/// recursively.
pub fn touch_batch(batch: &RecordBatch) -> u64 {
    batch
        .columns()
        .iter()
        .fold(0u64, |acc, column| acc.wrapping_add(touch_array(column)))
}

fn touch_array(array: &dyn Array) -> u64 {
    match array.data_type() {
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(*v)),
        DataType::UInt32 => array
            .as_primitive::<UInt32Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(u64::from(*v))),
        DataType::UInt8 => array
            .as_primitive::<UInt8Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(u64::from(*v))),
        DataType::Int32 => array
            .as_primitive::<Int32Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(*v as u64)),
        DataType::Int16 => array
            .as_primitive::<Int16Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(*v as u64)),
        DataType::Float32 => array
            .as_primitive::<Float32Type>()
            .values()
            .iter()
            .fold(0u64, |acc, v| acc.wrapping_add(u64::from(v.to_bits()))),
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            let offsets = list
                .value_offsets()
                .iter()
                .fold(0u64, |acc, o| acc.wrapping_add(*o as u64));
            offsets.wrapping_add(touch_array(list.values().as_ref()))
        }
        DataType::Struct(_) => array
            .as_struct()
            .columns()
            .iter()
            .fold(0u64, |acc, column| acc.wrapping_add(touch_array(column))),
        other => {
            debug!(?other, "unexpected column type in scan");
            array.len() as u64
        }
    }
}
