//! End-to-end checks over real parquet containers: every layout variant must
//! persist the same logical element totals, cluster-aligned read chunks must
//! land on cluster boundaries, and repeated scans must see identical data.

use std::path::Path;
use std::time::Duration;

use bench_layouts::bench_run::benchmark_read;
use bench_layouts::config::{BenchParams, EventShape, WriteOptions};
use bench_layouts::counts::{ElementCounts, count_variant};
use bench_layouts::layout::{Granularity, Grouping, LayoutVariant, all_variants};
use bench_layouts::read::read_variant;
use bench_layouts::split::split_clusters;
use bench_layouts::store::TableReader;
use bench_layouts::write::write_variant;
use tempfile::TempDir;

const EVENTS: u64 = 6;
const HITS: u64 = 5;
const WIRES: u64 = 3;
const ROIS: u64 = 2;
const SPILLS: u64 = 2;

fn params() -> BenchParams {
    BenchParams {
        num_events: EVENTS as usize,
        shape: EventShape {
            hits_per_event: HITS as usize,
            wires_per_event: WIRES as usize,
            rois_per_wire: ROIS as usize,
            samples_per_roi: 4,
        },
        spills: SPILLS as usize,
        threads: 2,
        iterations: 1,
    }
}

fn write(variant: LayoutVariant, container: &Path) -> Duration {
    write_variant(
        variant,
        &params(),
        &WriteOptions { rows_per_cluster: 8 },
        container,
    )
    .expect("write succeeds")
}

/// Physical row totals implied by the generation parameters, per variant.
fn expected_rows(variant: LayoutVariant) -> u64 {
    let hits = EVENTS * HITS;
    let wires = EVENTS * WIRES;
    let rois = wires * ROIS;
    match (variant.granularity, variant.grouping) {
        (Granularity::Event, Grouping::All) => EVENTS,
        (Granularity::Event, Grouping::PerDataProduct) => EVENTS * 2,
        (Granularity::Event, Grouping::PerGroup) => EVENTS * 3,
        (Granularity::Spill, Grouping::All) => EVENTS * SPILLS,
        (Granularity::Spill, Grouping::PerDataProduct) => EVENTS * SPILLS * 2,
        (Granularity::Spill, Grouping::PerGroup) => EVENTS * SPILLS * 3,
        (Granularity::TopObject, Grouping::All | Grouping::PerDataProduct) => hits + wires,
        (Granularity::TopObject, Grouping::PerGroup) => hits + wires * 2,
        (Granularity::Element, _) => hits + wires + rois,
    }
}

#[test]
fn every_variant_persists_the_same_element_totals() {
    let expected = ElementCounts {
        hits: EVENTS * HITS,
        wires: EVENTS * WIRES,
        rois: EVENTS * WIRES * ROIS,
    };

    for variant in all_variants() {
        let dir = TempDir::new().expect("tempdir");
        write(variant, dir.path());
        let counts = count_variant(variant, dir.path()).expect("countable");
        assert_eq!(counts, expected, "variant {variant} lost elements");
    }
}

#[test]
fn scans_touch_every_physical_row() {
    for variant in all_variants() {
        let dir = TempDir::new().expect("tempdir");
        write(variant, dir.path());

        let cold = read_variant(variant, dir.path(), 2).expect("cold scan");
        let warm = read_variant(variant, dir.path(), 2).expect("warm scan");

        assert_eq!(cold.rows, expected_rows(variant), "variant {variant}");
        assert_eq!(cold.rows, warm.rows);
        assert_eq!(cold.checksum, warm.checksum);
    }
}

#[test]
fn clusters_reflect_the_flush_protocol() {
    let variant = LayoutVariant {
        granularity: Granularity::Event,
        grouping: Grouping::All,
    };
    let dir = TempDir::new().expect("tempdir");
    let single_thread = BenchParams {
        num_events: 10,
        threads: 1,
        ..params()
    };
    write_variant(
        variant,
        &single_thread,
        &WriteOptions { rows_per_cluster: 4 },
        dir.path(),
    )
    .expect("write succeeds");

    let reader = TableReader::open(dir.path(), "events").expect("open");
    assert_eq!(reader.entry_count(), 10);

    let clusters = reader.clusters();
    let sizes: Vec<u64> = clusters.iter().map(|c| c.num_entries).collect();
    assert_eq!(sizes, [4, 4, 2]);

    let chunks = split_clusters(&clusters, 2);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].entries, 0..8);
    assert_eq!(chunks[1].entries, 8..10);
}

#[test]
fn rejected_configuration_writes_nothing() {
    let variant = LayoutVariant {
        granularity: Granularity::Spill,
        grouping: Grouping::PerGroup,
    };
    let dir = TempDir::new().expect("tempdir");
    let container = dir.path().join("run");

    let bad = BenchParams {
        spills: 0,
        ..params()
    };
    let elapsed = write_variant(variant, &bad, &WriteOptions::default(), &container)
        .expect("rejection is not an error");
    assert_eq!(elapsed, Duration::ZERO);
    assert!(!container.exists());

    let no_events = BenchParams {
        num_events: 0,
        ..params()
    };
    let elapsed = write_variant(variant, &no_events, &WriteOptions::default(), &container)
        .expect("rejection is not an error");
    assert_eq!(elapsed, Duration::ZERO);
    assert!(!container.exists());
}

#[test]
fn surplus_threads_skip_empty_chunks() {
    let variant = LayoutVariant {
        granularity: Granularity::Element,
        grouping: Grouping::PerGroup,
    };
    let dir = TempDir::new().expect("tempdir");
    let sparse = BenchParams {
        num_events: 3,
        threads: 8,
        ..params()
    };
    write_variant(
        variant,
        &sparse,
        &WriteOptions { rows_per_cluster: 8 },
        dir.path(),
    )
    .expect("write succeeds");

    let counts = count_variant(variant, dir.path()).expect("countable");
    assert_eq!(
        counts,
        ElementCounts {
            hits: 3 * HITS,
            wires: 3 * WIRES,
            rois: 3 * WIRES * ROIS,
        }
    );
}

#[test]
fn a_missing_container_becomes_a_failed_measurement() {
    let variant = LayoutVariant {
        granularity: Granularity::Event,
        grouping: Grouping::All,
    };
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("never-written");

    let m = benchmark_read("read/missing", variant, 2, 1, || {
        let cold = read_variant(variant, &missing, 2)?;
        let warm = read_variant(variant, &missing, 2)?;
        Ok((cold.elapsed, warm.elapsed))
    });
    assert!(m.failed);
    assert!(m.error.is_some());
}
