//! Parallel write orchestrator: contiguous event ranges per worker thread,
//! each with its own generator and fill contexts; the only cross-thread
//! synchronization is the per-table cluster commit inside the store adapter.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, error};

use crate::config::{BenchParams, WriteOptions};
use crate::event::EventGenerator;
use crate::layout::LayoutVariant;
use crate::layout::sinks::VariantStore;
use crate::seeds::generate_seeds;
use crate::split::split_range;

/// Writes `params.num_events` synthetic events into `container` under the
/// given variant, using `params.threads` workers. Returns the sum of the
/// workers' measured bind-and-commit intervals; synthetic generation is
/// excluded from the measurement. Invalid parameters are diagnosed and yield
/// a zero result without touching the container.
pub fn write_variant(
    variant: LayoutVariant,
    params: &BenchParams,
    opts: &WriteOptions,
    container: &Path,
) -> anyhow::Result<Duration> {
    if let Some(reason) = params.reject_write(variant) {
        error!(variant = %variant, "rejecting write configuration: {reason}");
        return Ok(Duration::ZERO);
    }

    let store = VariantStore::create(variant, container, params.spills, opts.rows_per_cluster)?;
    let seeds = generate_seeds(params.threads);
    let chunks = split_range(0, params.num_events as u64, params.threads);
    let shape = params.shape;

    let total = thread::scope(|scope| {
        let mut workers = Vec::with_capacity(params.threads);
        for (chunk, seed) in chunks.into_iter().zip(seeds) {
            let store = &store;
            workers.push(scope.spawn(move || -> anyhow::Result<Duration> {
                if chunk.start >= chunk.end {
                    return Ok(Duration::ZERO);
                }
                let mut generator = EventGenerator::new(seed, shape);
                let mut sink = store.sink();
                let mut elapsed = Duration::ZERO;
                for entry in chunk {
                    let event = generator.generate(entry);
                    let start = Instant::now();
                    sink.absorb(&event)?;
                    elapsed += start.elapsed();
                }
                let start = Instant::now();
                sink.finalize()?;
                elapsed += start.elapsed();
                Ok(elapsed)
            }));
        }

        let mut total = Duration::ZERO;
        for worker in workers {
            total += worker
                .join()
                .map_err(|_| anyhow!("write worker panicked"))??;
        }
        Ok::<_, anyhow::Error>(total)
    })?;

    store.close()?;
    debug!(variant = %variant, ?total, "write pass complete");
    Ok(total)
}
