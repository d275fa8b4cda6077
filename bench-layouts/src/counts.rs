//! Recovers logical element totals from a variant's physical tables. Every
//! layout must be invertible for counting purposes: row counts, list-offset
//! spans and discriminants alone reconstruct how many hits, wires and ROIs
//! were persisted, whatever the physical shape. This is what makes the
//! cross-variant invariant mechanically checkable.

use std::ops::AddAssign;
use std::path::Path;

use anyhow::{Context, anyhow};
use arrow_array::cast::AsArray;
use arrow_array::types::UInt8Type;
use arrow_array::{Array, GenericListArray, RecordBatch};

use crate::layout::builders::{KIND_HIT, KIND_ROI, KIND_WIRE};
use crate::layout::{Granularity, Grouping, LayoutVariant};
use crate::store::TableReader;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElementCounts {
    pub hits: u64,
    pub wires: u64,
    pub rois: u64,
}

impl AddAssign for ElementCounts {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.wires += other.wires;
        self.rois += other.rois;
    }
}

/// Sums hit/wire/ROI occurrences across the physical rows of `variant`.
pub fn count_variant(
    variant: LayoutVariant,
    container: &Path,
) -> anyhow::Result<ElementCounts> {
    let mut counts = ElementCounts::default();
    match (variant.granularity, variant.grouping) {
        (Granularity::Event | Granularity::Spill, Grouping::All) => {
            for_each_batch(container, "events", &["hits", "wires"], |batch| {
                let hits = named_list(batch, "hits")?;
                let wires = named_list(batch, "wires")?;
                counts.hits += list_span(hits);
                counts.wires += list_span(wires);
                counts.rois += nested_roi_span(wires)?;
                Ok(())
            })?;
        }
        (Granularity::Event | Granularity::Spill, Grouping::PerDataProduct) => {
            for_each_batch(container, "hits", &["hits"], |batch| {
                counts.hits += list_span(named_list(batch, "hits")?);
                Ok(())
            })?;
            for_each_batch(container, "wires", &["wires"], |batch| {
                let wires = named_list(batch, "wires")?;
                counts.wires += list_span(wires);
                counts.rois += nested_roi_span(wires)?;
                Ok(())
            })?;
        }
        (Granularity::Event | Granularity::Spill, Grouping::PerGroup) => {
            for_each_batch(container, "hits", &["hits"], |batch| {
                counts.hits += list_span(named_list(batch, "hits")?);
                Ok(())
            })?;
            for_each_batch(container, "wires", &["wires"], |batch| {
                counts.wires += list_span(named_list(batch, "wires")?);
                Ok(())
            })?;
            for_each_batch(container, "rois", &["rois"], |batch| {
                counts.rois += list_span(named_list(batch, "rois")?);
                Ok(())
            })?;
        }
        (Granularity::TopObject, Grouping::All) => {
            for_each_batch(container, "objects", &["kind", "wire"], |batch| {
                let (hits, wires, _) = kind_counts(batch)?;
                counts.hits += hits;
                counts.wires += wires;
                // Null hit-rows contribute empty ROI lists, so the full span
                // is exactly the wire rows' ROI total.
                let wire_structs = batch
                    .column_by_name("wire")
                    .ok_or_else(|| anyhow!("objects table missing wire column"))?
                    .as_struct();
                let rois = wire_structs
                    .column_by_name("rois")
                    .ok_or_else(|| anyhow!("wire struct missing rois"))?
                    .as_list::<i32>();
                counts.rois += list_span(rois);
                Ok(())
            })?;
        }
        (Granularity::TopObject, Grouping::PerDataProduct) => {
            counts.hits += table_rows(container, "hits")?;
            counts.wires += table_rows(container, "wires")?;
            for_each_batch(container, "wires", &["rois"], |batch| {
                counts.rois += list_span(named_list(batch, "rois")?);
                Ok(())
            })?;
        }
        (Granularity::TopObject, Grouping::PerGroup) => {
            counts.hits += table_rows(container, "hits")?;
            counts.wires += table_rows(container, "wires")?;
            for_each_batch(container, "rois", &["rois"], |batch| {
                counts.rois += list_span(named_list(batch, "rois")?);
                Ok(())
            })?;
        }
        (Granularity::Element, Grouping::All) => {
            for_each_batch(container, "elements", &["kind"], |batch| {
                let (hits, wires, rois) = kind_counts(batch)?;
                counts.hits += hits;
                counts.wires += wires;
                counts.rois += rois;
                Ok(())
            })?;
        }
        (Granularity::Element, Grouping::PerDataProduct) => {
            counts.hits += table_rows(container, "hits")?;
            for_each_batch(container, "wires", &["kind"], |batch| {
                let (_, wires, rois) = kind_counts(batch)?;
                counts.wires += wires;
                counts.rois += rois;
                Ok(())
            })?;
        }
        (Granularity::Element, Grouping::PerGroup) => {
            counts.hits += table_rows(container, "hits")?;
            counts.wires += table_rows(container, "wires")?;
            counts.rois += table_rows(container, "rois")?;
        }
    }
    Ok(counts)
}

fn table_rows(container: &Path, table: &str) -> anyhow::Result<u64> {
    Ok(TableReader::open(container, table)?.entry_count())
}

fn for_each_batch(
    container: &Path,
    table: &str,
    columns: &[&str],
    mut visit: impl FnMut(&RecordBatch) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let reader = TableReader::open(container, table)?;
    let cluster_count = reader.clusters().len();
    let scan = reader.scan_columns(0..cluster_count, columns)?;
    for batch in scan {
        let batch = batch.with_context(|| format!("decoding table {table}"))?;
        visit(&batch)?;
    }
    Ok(())
}

fn named_list<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> anyhow::Result<&'a GenericListArray<i32>> {
    Ok(batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("missing column {name}"))?
        .as_list::<i32>())
}

/// Total elements across the rows of a list column.
fn list_span(list: &GenericListArray<i32>) -> u64 {
    let offsets = list.value_offsets();
    (offsets[list.len()] - offsets[0]) as u64
}

/// Total ROI elements nested inside a list-of-wire-structs column.
fn nested_roi_span(wires: &GenericListArray<i32>) -> anyhow::Result<u64> {
    let structs = wires.values().as_struct();
    let rois = structs
        .column_by_name("rois")
        .ok_or_else(|| anyhow!("wire struct missing rois"))?
        .as_list::<i32>();
    let lo = wires.value_offsets()[0] as usize;
    let hi = wires.value_offsets()[wires.len()] as usize;
    let offsets = rois.value_offsets();
    Ok((offsets[hi] - offsets[lo]) as u64)
}

fn kind_counts(batch: &RecordBatch) -> anyhow::Result<(u64, u64, u64)> {
    let kinds = batch
        .column_by_name("kind")
        .ok_or_else(|| anyhow!("missing discriminant column"))?
        .as_primitive::<UInt8Type>();
    let mut hits = 0;
    let mut wires = 0;
    let mut rois = 0;
    for kind in kinds.values() {
        match *kind {
            KIND_HIT => hits += 1,
            KIND_WIRE => wires += 1,
            KIND_ROI => rois += 1,
            other => return Err(anyhow!("unknown discriminant {other}")),
        }
    }
    Ok((hits, wires, rois))
}
