//! Per-variant write-side projection: an [`EventSink`] turns one logical
//! event into row fills against this worker's private fill contexts,
//! following the bind / flush-columns / flush-cluster protocol. A
//! [`VariantStore`] owns the shared table writers and hands out one sink per
//! worker thread.

use std::path::Path;
use std::sync::Arc;

use arrow_schema::SchemaRef;

use crate::event::{Event, Hit, Wire, WireBase};
use crate::layout::builders::{
    ElementRef, ElementRowBuilder, EventRowBuilder, HitRowBuilder, HitVecRowBuilder, ObjectRef,
    RoiFlatRowBuilder, RoiFlatVecRowBuilder, TaggedObjectRowBuilder, WireBaseRowBuilder,
    WireBaseVecRowBuilder, WireElementRef, WireElementRowBuilder, WireRowBuilder,
    WireVecRowBuilder,
};
use crate::layout::{Granularity, Grouping, LayoutVariant, RoiFlatRef, flatten_rois, spill_slices};
use crate::store::{FillContext, RowBatchBuilder, TableModel, TableWriter};

/// One worker's write surface for a layout variant.
pub trait EventSink: Send {
    /// Projects one logical event into the variant's tables, committing rows
    /// and closing clusters as the contexts request.
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()>;

    /// Flushes whatever is still buffered as final short clusters.
    fn finalize(&mut self) -> anyhow::Result<()>;
}

/// Shared per-variant state: one open writer per physical table.
pub struct VariantStore {
    variant: LayoutVariant,
    spills: usize,
    rows_per_cluster: usize,
    tables: Vec<Arc<TableWriter>>,
}

impl VariantStore {
    pub fn create(
        variant: LayoutVariant,
        container: &Path,
        spills: usize,
        rows_per_cluster: usize,
    ) -> anyhow::Result<Self> {
        let tables = variant
            .table_names()
            .iter()
            .zip(table_schemas(variant))
            .map(|(name, schema)| TableWriter::open(TableModel::new(*name, schema), container))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            variant,
            spills,
            rows_per_cluster,
            tables,
        })
    }

    fn context<B: RowBatchBuilder>(&self, table: usize) -> FillContext<B> {
        self.tables[table].fill_context(self.rows_per_cluster)
    }

    /// A fresh, exclusively-owned sink for one worker thread.
    pub fn sink(&self) -> Box<dyn EventSink> {
        match (self.variant.granularity, self.variant.grouping) {
            (Granularity::Event, Grouping::All) => Box::new(PerEvent(AllEntrySink {
                events: self.context(0),
            })),
            (Granularity::Spill, Grouping::All) => Box::new(PerSpill {
                inner: AllEntrySink {
                    events: self.context(0),
                },
                spills: self.spills,
            }),
            (Granularity::Event, Grouping::PerDataProduct) => Box::new(PerEvent(ProductEntrySink {
                hits: self.context(0),
                wires: self.context(1),
            })),
            (Granularity::Spill, Grouping::PerDataProduct) => Box::new(PerSpill {
                inner: ProductEntrySink {
                    hits: self.context(0),
                    wires: self.context(1),
                },
                spills: self.spills,
            }),
            (Granularity::Event, Grouping::PerGroup) => Box::new(PerEvent(GroupEntrySink {
                hits: self.context(0),
                bases: self.context(1),
                rois: self.context(2),
            })),
            (Granularity::Spill, Grouping::PerGroup) => Box::new(PerSpill {
                inner: GroupEntrySink {
                    hits: self.context(0),
                    bases: self.context(1),
                    rois: self.context(2),
                },
                spills: self.spills,
            }),
            (Granularity::TopObject, Grouping::All) => Box::new(ObjectAllSink {
                objects: self.context(0),
            }),
            (Granularity::TopObject, Grouping::PerDataProduct) => Box::new(ObjectProductSink {
                hits: self.context(0),
                wires: self.context(1),
            }),
            (Granularity::TopObject, Grouping::PerGroup) => Box::new(ObjectGroupSink {
                hits: self.context(0),
                bases: self.context(1),
                rois: self.context(2),
            }),
            (Granularity::Element, Grouping::All) => Box::new(ElementAllSink {
                elements: self.context(0),
            }),
            (Granularity::Element, Grouping::PerDataProduct) => Box::new(ElementProductSink {
                hits: self.context(0),
                wires: self.context(1),
            }),
            (Granularity::Element, Grouping::PerGroup) => Box::new(ElementGroupSink {
                hits: self.context(0),
                bases: self.context(1),
                rois: self.context(2),
            }),
        }
    }

    /// Writes every table's footer. Call only after all sinks are finalized.
    pub fn close(&self) -> anyhow::Result<()> {
        for table in &self.tables {
            table.close()?;
        }
        Ok(())
    }
}

/// Physical table schemas of a variant, in [`LayoutVariant::table_names`] order.
pub fn table_schemas(variant: LayoutVariant) -> Vec<SchemaRef> {
    match (variant.granularity, variant.grouping) {
        (Granularity::Event | Granularity::Spill, Grouping::All) => {
            vec![EventRowBuilder::schema()]
        }
        (Granularity::Event | Granularity::Spill, Grouping::PerDataProduct) => {
            vec![HitVecRowBuilder::schema(), WireVecRowBuilder::schema()]
        }
        (Granularity::Event | Granularity::Spill, Grouping::PerGroup) => vec![
            HitVecRowBuilder::schema(),
            WireBaseVecRowBuilder::schema(),
            RoiFlatVecRowBuilder::schema(),
        ],
        (Granularity::TopObject, Grouping::All) => vec![TaggedObjectRowBuilder::schema()],
        (Granularity::TopObject, Grouping::PerDataProduct) => {
            vec![HitRowBuilder::schema(), WireRowBuilder::schema()]
        }
        (Granularity::TopObject, Grouping::PerGroup) => vec![
            HitRowBuilder::schema(),
            WireBaseRowBuilder::schema(),
            WireRowBuilder::schema(),
        ],
        (Granularity::Element, Grouping::All) => vec![ElementRowBuilder::schema()],
        (Granularity::Element, Grouping::PerDataProduct) => {
            vec![HitRowBuilder::schema(), WireElementRowBuilder::schema()]
        }
        (Granularity::Element, Grouping::PerGroup) => vec![
            HitRowBuilder::schema(),
            WireBaseRowBuilder::schema(),
            RoiFlatRowBuilder::schema(),
        ],
    }
}

/// Event- and spill-granularity sinks share the same row shapes; only the
/// entry identity and the hit/wire slices differ.
trait EntrySink: Send {
    fn emit(&mut self, id: u64, hits: &[Hit], wires: &[Wire]) -> anyhow::Result<()>;
    fn finish(&mut self) -> anyhow::Result<()>;
}

struct PerEvent<S>(S);

impl<S: EntrySink> EventSink for PerEvent<S> {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        self.0.emit(event.id, &event.hits, &event.wires)
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.0.finish()
    }
}

struct PerSpill<S> {
    inner: S,
    spills: usize,
}

impl<S: EntrySink> EventSink for PerSpill<S> {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        let hit_slices = spill_slices(event.hits.len(), self.spills);
        let wire_slices = spill_slices(event.wires.len(), self.spills);
        for (spill, (hr, wr)) in hit_slices.zip(wire_slices).enumerate() {
            let id = event.id * self.spills as u64 + spill as u64;
            self.inner.emit(id, &event.hits[hr], &event.wires[wr])?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.inner.finish()
    }
}

struct AllEntrySink {
    events: FillContext<EventRowBuilder>,
}

impl EntrySink for AllEntrySink {
    fn emit(&mut self, id: u64, hits: &[Hit], wires: &[Wire]) -> anyhow::Result<()> {
        self.events.commit((id, hits, wires))
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.events.finish()
    }
}

struct ProductEntrySink {
    hits: FillContext<HitVecRowBuilder>,
    wires: FillContext<WireVecRowBuilder>,
}

impl EntrySink for ProductEntrySink {
    fn emit(&mut self, id: u64, hits: &[Hit], wires: &[Wire]) -> anyhow::Result<()> {
        self.hits.commit((id, hits))?;
        self.wires.commit((id, wires))
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.wires.finish()
    }
}

struct GroupEntrySink {
    hits: FillContext<HitVecRowBuilder>,
    bases: FillContext<WireBaseVecRowBuilder>,
    rois: FillContext<RoiFlatVecRowBuilder>,
}

impl EntrySink for GroupEntrySink {
    fn emit(&mut self, id: u64, hits: &[Hit], wires: &[Wire]) -> anyhow::Result<()> {
        self.hits.commit((id, hits))?;
        self.bases.commit((id, wires))?;
        self.rois.commit((id, wires))
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.bases.finish()?;
        self.rois.finish()
    }
}

struct ObjectAllSink {
    objects: FillContext<TaggedObjectRowBuilder>,
}

impl EventSink for ObjectAllSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.objects.commit((event.id, ObjectRef::Hit(hit)))?;
        }
        for wire in &event.wires {
            self.objects.commit((event.id, ObjectRef::Wire(wire)))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.objects.finish()
    }
}

struct ObjectProductSink {
    hits: FillContext<HitRowBuilder>,
    wires: FillContext<WireRowBuilder>,
}

impl EventSink for ObjectProductSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.hits.commit((event.id, hit))?;
        }
        for wire in &event.wires {
            self.wires.commit((event.id, wire))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.wires.finish()
    }
}

struct ObjectGroupSink {
    hits: FillContext<HitRowBuilder>,
    bases: FillContext<WireBaseRowBuilder>,
    rois: FillContext<WireRowBuilder>,
}

impl EventSink for ObjectGroupSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.hits.commit((event.id, hit))?;
        }
        for wire in &event.wires {
            self.bases.commit((event.id, WireBase::from(wire)))?;
            self.rois.commit((event.id, wire))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.bases.finish()?;
        self.rois.finish()
    }
}

struct ElementAllSink {
    elements: FillContext<ElementRowBuilder>,
}

impl EventSink for ElementAllSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.elements.commit((event.id, ElementRef::Hit(hit)))?;
        }
        for wire in &event.wires {
            self.elements
                .commit((event.id, ElementRef::Wire(WireBase::from(wire))))?;
        }
        for roi in flatten_rois(&event.wires) {
            self.elements.commit((event.id, ElementRef::Roi(roi)))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.elements.finish()
    }
}

struct ElementProductSink {
    hits: FillContext<HitRowBuilder>,
    wires: FillContext<WireElementRowBuilder>,
}

impl EventSink for ElementProductSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.hits.commit((event.id, hit))?;
        }
        for wire in &event.wires {
            self.wires
                .commit((event.id, WireElementRef::Base(WireBase::from(wire))))?;
            for roi in &wire.rois {
                let flat = RoiFlatRef {
                    channel: wire.channel,
                    view: wire.view,
                    roi,
                };
                self.wires.commit((event.id, WireElementRef::Roi(flat)))?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.wires.finish()
    }
}

struct ElementGroupSink {
    hits: FillContext<HitRowBuilder>,
    bases: FillContext<WireBaseRowBuilder>,
    rois: FillContext<RoiFlatRowBuilder>,
}

impl EventSink for ElementGroupSink {
    fn absorb(&mut self, event: &Event) -> anyhow::Result<()> {
        for hit in &event.hits {
            self.hits.commit((event.id, hit))?;
        }
        for wire in &event.wires {
            self.bases.commit((event.id, WireBase::from(wire)))?;
        }
        for roi in flatten_rois(&event.wires) {
            self.rois.commit((event.id, roi))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.hits.finish()?;
        self.bases.finish()?;
        self.rois.finish()
    }
}
