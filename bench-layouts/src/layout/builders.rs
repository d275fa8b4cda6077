//! One [`RowBatchBuilder`] per physical row shape of the catalog. Vec-style
//! builders hold one entry per event (or spill sub-entry); row-style builders
//! hold one entry per object or leaf element. Tagged shapes carry a `u8`
//! discriminant plus one nullable struct column per payload arm.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_array::builder::{UInt8Builder, UInt64Builder};
use arrow_schema::{ArrowError, DataType, Field, Fields, Schema, SchemaRef};

use crate::event::{Hit, Wire, WireBase};
use crate::layout::columns::{
    HitCols, Offsets, RoiFlatCols, Validity, WireBaseCols, WireCols, hit_fields, item_field,
    list_array, list_of, roi_flat_fields, struct_array, wire_base_fields, wire_fields,
};
use crate::layout::{RoiFlatRef, flatten_rois};
use crate::store::RowBatchBuilder;

pub const KIND_HIT: u8 = 0;
pub const KIND_WIRE: u8 = 1;
pub const KIND_ROI: u8 = 2;

/// Top-level object payload for the tagged object table.
#[derive(Clone, Copy, Debug)]
pub enum ObjectRef<'a> {
    Hit(&'a Hit),
    Wire(&'a Wire),
}

/// Leaf element payload for the tagged element table.
#[derive(Clone, Copy, Debug)]
pub enum ElementRef<'a> {
    Hit(&'a Hit),
    Wire(WireBase),
    Roi(RoiFlatRef<'a>),
}

/// Wire-side element payload when hits live in their own table.
#[derive(Clone, Copy, Debug)]
pub enum WireElementRef<'a> {
    Base(WireBase),
    Roi(RoiFlatRef<'a>),
}

fn schema_of(fields: Vec<Field>) -> SchemaRef {
    Arc::new(Schema::new(fields))
}

fn id_field() -> Field {
    Field::new("id", DataType::UInt64, false)
}

fn inline(fields: Fields) -> Vec<Field> {
    fields.iter().map(|f| f.as_ref().clone()).collect()
}

fn flat_schema(fields: Fields) -> SchemaRef {
    let mut all = vec![id_field()];
    all.extend(inline(fields));
    schema_of(all)
}

/// `events`: one row per entry, hits and wires fully nested.
#[derive(Default)]
pub struct EventRowBuilder {
    id: UInt64Builder,
    hits: HitCols,
    hit_offsets: Offsets,
    wires: WireCols,
    wire_offsets: Offsets,
    rows: usize,
}

impl RowBatchBuilder for EventRowBuilder {
    type Row<'a> = (u64, &'a [Hit], &'a [Wire]);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("hits", list_of(DataType::Struct(hit_fields())), false),
            Field::new("wires", list_of(DataType::Struct(wire_fields())), false),
        ])
    }

    fn push(&mut self, (id, hits, wires): Self::Row<'_>) {
        self.id.append_value(id);
        for hit in hits {
            self.hits.append(hit);
        }
        self.hit_offsets.push_len(hits.len());
        for wire in wires {
            self.wires.append(wire);
        }
        self.wire_offsets.push_len(wires.len());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            list_array(
                item_field(DataType::Struct(hit_fields())),
                self.hit_offsets.finish(),
                struct_array(hit_fields(), self.hits.finish(), None),
            ),
            list_array(
                item_field(DataType::Struct(wire_fields())),
                self.wire_offsets.finish(),
                struct_array(wire_fields(), self.wires.finish(), None),
            ),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `hits`: one row per entry carrying that entry's hit list.
#[derive(Default)]
pub struct HitVecRowBuilder {
    id: UInt64Builder,
    hits: HitCols,
    offsets: Offsets,
    rows: usize,
}

impl RowBatchBuilder for HitVecRowBuilder {
    type Row<'a> = (u64, &'a [Hit]);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("hits", list_of(DataType::Struct(hit_fields())), false),
        ])
    }

    fn push(&mut self, (id, hits): Self::Row<'_>) {
        self.id.append_value(id);
        for hit in hits {
            self.hits.append(hit);
        }
        self.offsets.push_len(hits.len());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            list_array(
                item_field(DataType::Struct(hit_fields())),
                self.offsets.finish(),
                struct_array(hit_fields(), self.hits.finish(), None),
            ),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `wires`: one row per entry carrying the full nested wire list.
#[derive(Default)]
pub struct WireVecRowBuilder {
    id: UInt64Builder,
    wires: WireCols,
    offsets: Offsets,
    rows: usize,
}

impl RowBatchBuilder for WireVecRowBuilder {
    type Row<'a> = (u64, &'a [Wire]);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("wires", list_of(DataType::Struct(wire_fields())), false),
        ])
    }

    fn push(&mut self, (id, wires): Self::Row<'_>) {
        self.id.append_value(id);
        for wire in wires {
            self.wires.append(wire);
        }
        self.offsets.push_len(wires.len());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            list_array(
                item_field(DataType::Struct(wire_fields())),
                self.offsets.finish(),
                struct_array(wire_fields(), self.wires.finish(), None),
            ),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `wires` for per-group layouts: identity only, ROIs live elsewhere.
#[derive(Default)]
pub struct WireBaseVecRowBuilder {
    id: UInt64Builder,
    bases: WireBaseCols,
    offsets: Offsets,
    rows: usize,
}

impl RowBatchBuilder for WireBaseVecRowBuilder {
    type Row<'a> = (u64, &'a [Wire]);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("wires", list_of(DataType::Struct(wire_base_fields())), false),
        ])
    }

    fn push(&mut self, (id, wires): Self::Row<'_>) {
        self.id.append_value(id);
        for wire in wires {
            self.bases.append(WireBase::from(wire));
        }
        self.offsets.push_len(wires.len());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            list_array(
                item_field(DataType::Struct(wire_base_fields())),
                self.offsets.finish(),
                struct_array(wire_base_fields(), self.bases.finish(), None),
            ),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `rois` for per-group layouts: one row per entry carrying the flattened
/// ROI list, each element tagged with its owning wire's identity.
#[derive(Default)]
pub struct RoiFlatVecRowBuilder {
    id: UInt64Builder,
    rois: RoiFlatCols,
    offsets: Offsets,
    rows: usize,
}

impl RowBatchBuilder for RoiFlatVecRowBuilder {
    type Row<'a> = (u64, &'a [Wire]);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("rois", list_of(DataType::Struct(roi_flat_fields())), false),
        ])
    }

    fn push(&mut self, (id, wires): Self::Row<'_>) {
        self.id.append_value(id);
        for roi in flatten_rois(wires) {
            self.rois.append(roi);
        }
        self.offsets
            .push_len(wires.iter().map(|w| w.rois.len()).sum());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            list_array(
                item_field(DataType::Struct(roi_flat_fields())),
                self.offsets.finish(),
                struct_array(roi_flat_fields(), self.rois.finish(), None),
            ),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `objects`: one row per top-level object, tagged hit-or-wire.
#[derive(Default)]
pub struct TaggedObjectRowBuilder {
    id: UInt64Builder,
    kind: UInt8Builder,
    hit: HitCols,
    hit_valid: Validity,
    wire: WireCols,
    wire_valid: Validity,
    rows: usize,
}

impl RowBatchBuilder for TaggedObjectRowBuilder {
    type Row<'a> = (u64, ObjectRef<'a>);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("kind", DataType::UInt8, false),
            Field::new("hit", DataType::Struct(hit_fields()), true),
            Field::new("wire", DataType::Struct(wire_fields()), true),
        ])
    }

    fn push(&mut self, (id, object): Self::Row<'_>) {
        self.id.append_value(id);
        match object {
            ObjectRef::Hit(hit) => {
                self.kind.append_value(KIND_HIT);
                self.hit.append(hit);
                self.hit_valid.push(true);
                self.wire.append_default();
                self.wire_valid.push(false);
            }
            ObjectRef::Wire(wire) => {
                self.kind.append_value(KIND_WIRE);
                self.hit.append_default();
                self.hit_valid.push(false);
                self.wire.append(wire);
                self.wire_valid.push(true);
            }
        }
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            Arc::new(self.kind.finish()) as _,
            struct_array(hit_fields(), self.hit.finish(), self.hit_valid.finish()),
            struct_array(wire_fields(), self.wire.finish(), self.wire_valid.finish()),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `hits` with one row per hit, fields inlined at top level.
#[derive(Default)]
pub struct HitRowBuilder {
    id: UInt64Builder,
    hit: HitCols,
    rows: usize,
}

impl RowBatchBuilder for HitRowBuilder {
    type Row<'a> = (u64, &'a Hit);

    fn schema() -> SchemaRef {
        flat_schema(hit_fields())
    }

    fn push(&mut self, (id, hit): Self::Row<'_>) {
        self.id.append_value(id);
        self.hit.append(hit);
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut columns = vec![Arc::new(self.id.finish()) as _];
        columns.extend(self.hit.finish());
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `wires` with one row per wire, ROIs nested inline.
#[derive(Default)]
pub struct WireRowBuilder {
    id: UInt64Builder,
    wire: WireCols,
    rows: usize,
}

impl RowBatchBuilder for WireRowBuilder {
    type Row<'a> = (u64, &'a Wire);

    fn schema() -> SchemaRef {
        flat_schema(wire_fields())
    }

    fn push(&mut self, (id, wire): Self::Row<'_>) {
        self.id.append_value(id);
        self.wire.append(wire);
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut columns = vec![Arc::new(self.id.finish()) as _];
        columns.extend(self.wire.finish());
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `wires` with one row per wire identity, no payload.
#[derive(Default)]
pub struct WireBaseRowBuilder {
    id: UInt64Builder,
    base: WireBaseCols,
    rows: usize,
}

impl RowBatchBuilder for WireBaseRowBuilder {
    type Row<'a> = (u64, WireBase);

    fn schema() -> SchemaRef {
        flat_schema(wire_base_fields())
    }

    fn push(&mut self, (id, base): Self::Row<'_>) {
        self.id.append_value(id);
        self.base.append(base);
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut columns = vec![Arc::new(self.id.finish()) as _];
        columns.extend(self.base.finish());
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `elements`: one row per leaf element, tagged hit / wire-identity / ROI.
#[derive(Default)]
pub struct ElementRowBuilder {
    id: UInt64Builder,
    kind: UInt8Builder,
    hit: HitCols,
    hit_valid: Validity,
    wire: WireBaseCols,
    wire_valid: Validity,
    roi: RoiFlatCols,
    roi_valid: Validity,
    rows: usize,
}

impl RowBatchBuilder for ElementRowBuilder {
    type Row<'a> = (u64, ElementRef<'a>);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("kind", DataType::UInt8, false),
            Field::new("hit", DataType::Struct(hit_fields()), true),
            Field::new("wire", DataType::Struct(wire_base_fields()), true),
            Field::new("roi", DataType::Struct(roi_flat_fields()), true),
        ])
    }

    fn push(&mut self, (id, element): Self::Row<'_>) {
        self.id.append_value(id);
        let (kind, hit, wire, roi) = match element {
            ElementRef::Hit(h) => (KIND_HIT, Some(h), None, None),
            ElementRef::Wire(w) => (KIND_WIRE, None, Some(w), None),
            ElementRef::Roi(r) => (KIND_ROI, None, None, Some(r)),
        };
        self.kind.append_value(kind);
        match hit {
            Some(h) => {
                self.hit.append(h);
                self.hit_valid.push(true);
            }
            None => {
                self.hit.append_default();
                self.hit_valid.push(false);
            }
        }
        match wire {
            Some(w) => {
                self.wire.append(w);
                self.wire_valid.push(true);
            }
            None => {
                self.wire.append_default();
                self.wire_valid.push(false);
            }
        }
        match roi {
            Some(r) => {
                self.roi.append(r);
                self.roi_valid.push(true);
            }
            None => {
                self.roi.append_default();
                self.roi_valid.push(false);
            }
        }
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            Arc::new(self.kind.finish()) as _,
            struct_array(hit_fields(), self.hit.finish(), self.hit_valid.finish()),
            struct_array(wire_base_fields(), self.wire.finish(), self.wire_valid.finish()),
            struct_array(roi_flat_fields(), self.roi.finish(), self.roi_valid.finish()),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `wires` for element-per-row layouts where hits have their own table:
/// tagged wire-identity-or-ROI rows.
#[derive(Default)]
pub struct WireElementRowBuilder {
    id: UInt64Builder,
    kind: UInt8Builder,
    wire: WireBaseCols,
    wire_valid: Validity,
    roi: RoiFlatCols,
    roi_valid: Validity,
    rows: usize,
}

impl RowBatchBuilder for WireElementRowBuilder {
    type Row<'a> = (u64, WireElementRef<'a>);

    fn schema() -> SchemaRef {
        schema_of(vec![
            id_field(),
            Field::new("kind", DataType::UInt8, false),
            Field::new("wire", DataType::Struct(wire_base_fields()), true),
            Field::new("roi", DataType::Struct(roi_flat_fields()), true),
        ])
    }

    fn push(&mut self, (id, element): Self::Row<'_>) {
        self.id.append_value(id);
        match element {
            WireElementRef::Base(base) => {
                self.kind.append_value(KIND_WIRE);
                self.wire.append(base);
                self.wire_valid.push(true);
                self.roi.append_default();
                self.roi_valid.push(false);
            }
            WireElementRef::Roi(roi) => {
                self.kind.append_value(KIND_ROI);
                self.wire.append_default();
                self.wire_valid.push(false);
                self.roi.append(roi);
                self.roi_valid.push(true);
            }
        }
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns = vec![
            Arc::new(self.id.finish()) as _,
            Arc::new(self.kind.finish()) as _,
            struct_array(wire_base_fields(), self.wire.finish(), self.wire_valid.finish()),
            struct_array(roi_flat_fields(), self.roi.finish(), self.roi_valid.finish()),
        ];
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// `rois` with one flattened ROI per row.
#[derive(Default)]
pub struct RoiFlatRowBuilder {
    id: UInt64Builder,
    roi: RoiFlatCols,
    rows: usize,
}

impl RowBatchBuilder for RoiFlatRowBuilder {
    type Row<'a> = (u64, RoiFlatRef<'a>);

    fn schema() -> SchemaRef {
        flat_schema(roi_flat_fields())
    }

    fn push(&mut self, (id, roi): Self::Row<'_>) {
        self.id.append_value(id);
        self.roi.append(roi);
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut columns = vec![Arc::new(self.id.finish()) as _];
        columns.extend(self.roi.finish());
        self.rows = 0;
        RecordBatch::try_new(Self::schema(), columns)
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::Array;
    use arrow_array::cast::AsArray;
    use arrow_array::types::UInt8Type;

    use super::*;
    use crate::config::EventShape;
    use crate::event::EventGenerator;

    fn sample_event() -> crate::event::Event {
        EventGenerator::new(
            7,
            EventShape {
                hits_per_event: 3,
                wires_per_event: 2,
                rois_per_wire: 2,
                samples_per_roi: 4,
            },
        )
        .generate(11)
    }

    #[test]
    fn event_rows_nest_both_products() {
        let event = sample_event();
        let mut builder = EventRowBuilder::default();
        builder.push((event.id, &event.hits[..], &event.wires[..]));
        builder.push((event.id + 1, &event.hits[..1], &event.wires[..0]));
        assert_eq!(builder.len(), 2);

        let batch = builder.finish().expect("batch");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(builder.len(), 0);

        let hits = batch.column(1).as_list::<i32>();
        assert_eq!(hits.value_offsets(), &[0, 3, 4]);
        let wires = batch.column(2).as_list::<i32>();
        assert_eq!(wires.value_offsets(), &[0, 2, 2]);
    }

    #[test]
    fn element_rows_carry_one_live_payload() {
        let event = sample_event();
        let mut builder = ElementRowBuilder::default();
        builder.push((event.id, ElementRef::Hit(&event.hits[0])));
        builder.push((event.id, ElementRef::Wire(WireBase::from(&event.wires[0]))));
        for roi in flatten_rois(&event.wires) {
            builder.push((event.id, ElementRef::Roi(roi)));
        }

        let batch = builder.finish().expect("batch");
        assert_eq!(batch.num_rows(), 6);

        let kinds = batch.column(1).as_primitive::<UInt8Type>();
        assert_eq!(&kinds.values()[..], &[KIND_HIT, KIND_WIRE, KIND_ROI, KIND_ROI, KIND_ROI, KIND_ROI]);

        let hit_struct = batch.column(2).as_struct();
        assert_eq!(hit_struct.null_count(), 5);
        let wire_struct = batch.column(3).as_struct();
        assert_eq!(wire_struct.null_count(), 5);
        let roi_struct = batch.column(4).as_struct();
        assert_eq!(roi_struct.null_count(), 2);
    }

    #[test]
    fn flat_hit_rows_match_schema_width() {
        let event = sample_event();
        let mut builder = HitRowBuilder::default();
        for hit in &event.hits {
            builder.push((event.id, hit));
        }
        let batch = builder.finish().expect("batch");
        assert_eq!(batch.num_columns(), 1 + hit_fields().len());
        assert_eq!(batch.num_rows(), 3);
    }

    #[test]
    fn tagged_object_rows() {
        let event = sample_event();
        let mut builder = TaggedObjectRowBuilder::default();
        for hit in &event.hits {
            builder.push((event.id, ObjectRef::Hit(hit)));
        }
        for wire in &event.wires {
            builder.push((event.id, ObjectRef::Wire(wire)));
        }
        let batch = builder.finish().expect("batch");
        assert_eq!(batch.num_rows(), 5);

        let wires = batch.column(3).as_struct();
        assert_eq!(wires.null_count(), 3);
        let rois = wires.column_by_name("rois").expect("rois").as_list::<i32>();
        // Null hit-rows contribute empty ROI lists.
        assert_eq!(rois.value_offsets(), &[0, 0, 0, 0, 2, 4]);
    }
}
