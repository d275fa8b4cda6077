//! Hand-written column sets for the record shapes of the catalog. Each set
//! pairs a field-list constructor with an appender and a finisher, and the
//! same constructors back both schema creation and the count readers, so the
//! write and read paths agree structurally without any registration step.

use std::sync::Arc;

use arrow_array::builder::{
    Float32Builder, Int16Builder, Int32Builder, UInt8Builder, UInt32Builder, UInt64Builder,
};
use arrow_array::{ArrayRef, ListArray, StructArray};
use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, Field, FieldRef, Fields};

use crate::event::{Hit, Roi, Wire, WireBase};
use crate::layout::RoiFlatRef;

pub fn hit_fields() -> Fields {
    Fields::from(vec![
        Field::new("channel", DataType::UInt32, false),
        Field::new("view", DataType::UInt8, false),
        Field::new("start_tick", DataType::Int32, false),
        Field::new("end_tick", DataType::Int32, false),
        Field::new("peak_time", DataType::Float32, false),
        Field::new("sigma_peak_time", DataType::Float32, false),
        Field::new("rms", DataType::Float32, false),
        Field::new("peak_amplitude", DataType::Float32, false),
        Field::new("sigma_peak_amplitude", DataType::Float32, false),
        Field::new("summed_adc", DataType::Float32, false),
        Field::new("integral", DataType::Float32, false),
        Field::new("sigma_integral", DataType::Float32, false),
        Field::new("multiplicity", DataType::Int16, false),
        Field::new("local_index", DataType::Int16, false),
        Field::new("goodness_of_fit", DataType::Float32, false),
        Field::new("ndf", DataType::Int32, false),
    ])
}

pub fn wire_base_fields() -> Fields {
    Fields::from(vec![
        Field::new("channel", DataType::UInt32, false),
        Field::new("view", DataType::UInt8, false),
    ])
}

pub fn roi_fields() -> Fields {
    Fields::from(vec![
        Field::new("offset", DataType::UInt64, false),
        Field::new("data", list_of(DataType::Float32), false),
    ])
}

pub fn wire_fields() -> Fields {
    Fields::from(vec![
        Field::new("channel", DataType::UInt32, false),
        Field::new("view", DataType::UInt8, false),
        Field::new("rois", list_of(DataType::Struct(roi_fields())), false),
    ])
}

pub fn roi_flat_fields() -> Fields {
    Fields::from(vec![
        Field::new("channel", DataType::UInt32, false),
        Field::new("view", DataType::UInt8, false),
        Field::new("offset", DataType::UInt64, false),
        Field::new("data", list_of(DataType::Float32), false),
    ])
}

pub(crate) fn item_field(data_type: DataType) -> FieldRef {
    Arc::new(Field::new("item", data_type, false))
}

pub(crate) fn list_of(data_type: DataType) -> DataType {
    DataType::List(item_field(data_type))
}

pub(crate) fn list_array(item: FieldRef, offsets: OffsetBuffer<i32>, values: ArrayRef) -> ArrayRef {
    Arc::new(ListArray::new(item, offsets, values, None))
}

pub(crate) fn struct_array(
    fields: Fields,
    arrays: Vec<ArrayRef>,
    nulls: Option<NullBuffer>,
) -> ArrayRef {
    Arc::new(StructArray::new(fields, arrays, nulls))
}

/// List-offset accumulator; always holds the leading zero.
pub(crate) struct Offsets(Vec<i32>);

impl Default for Offsets {
    fn default() -> Self {
        Self(vec![0])
    }
}

impl Offsets {
    pub fn push_len(&mut self, len: usize) {
        let last = *self.0.last().expect("offsets never empty");
        self.0.push(last + len as i32);
    }

    pub fn finish(&mut self) -> OffsetBuffer<i32> {
        let raw = std::mem::replace(&mut self.0, vec![0]);
        OffsetBuffer::new(ScalarBuffer::from(raw))
    }
}

/// Validity accumulator for tagged-row payload columns. Finishing collapses
/// to no buffer when every slot is valid.
#[derive(Default)]
pub(crate) struct Validity(Vec<bool>);

impl Validity {
    pub fn push(&mut self, valid: bool) {
        self.0.push(valid);
    }

    pub fn finish(&mut self) -> Option<NullBuffer> {
        let raw = std::mem::take(&mut self.0);
        if raw.iter().all(|v| *v) {
            None
        } else {
            Some(NullBuffer::from(raw))
        }
    }
}

#[derive(Default)]
pub struct HitCols {
    channel: UInt32Builder,
    view: UInt8Builder,
    start_tick: Int32Builder,
    end_tick: Int32Builder,
    peak_time: Float32Builder,
    sigma_peak_time: Float32Builder,
    rms: Float32Builder,
    peak_amplitude: Float32Builder,
    sigma_peak_amplitude: Float32Builder,
    summed_adc: Float32Builder,
    integral: Float32Builder,
    sigma_integral: Float32Builder,
    multiplicity: Int16Builder,
    local_index: Int16Builder,
    goodness_of_fit: Float32Builder,
    ndf: Int32Builder,
}

impl HitCols {
    pub fn append(&mut self, hit: &Hit) {
        self.channel.append_value(hit.channel);
        self.view.append_value(hit.view);
        self.start_tick.append_value(hit.start_tick);
        self.end_tick.append_value(hit.end_tick);
        self.peak_time.append_value(hit.peak_time);
        self.sigma_peak_time.append_value(hit.sigma_peak_time);
        self.rms.append_value(hit.rms);
        self.peak_amplitude.append_value(hit.peak_amplitude);
        self.sigma_peak_amplitude.append_value(hit.sigma_peak_amplitude);
        self.summed_adc.append_value(hit.summed_adc);
        self.integral.append_value(hit.integral);
        self.sigma_integral.append_value(hit.sigma_integral);
        self.multiplicity.append_value(hit.multiplicity);
        self.local_index.append_value(hit.local_index);
        self.goodness_of_fit.append_value(hit.goodness_of_fit);
        self.ndf.append_value(hit.ndf);
    }

    pub fn append_default(&mut self) {
        self.append(&Hit::default());
    }

    pub fn finish(&mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.channel.finish()),
            Arc::new(self.view.finish()),
            Arc::new(self.start_tick.finish()),
            Arc::new(self.end_tick.finish()),
            Arc::new(self.peak_time.finish()),
            Arc::new(self.sigma_peak_time.finish()),
            Arc::new(self.rms.finish()),
            Arc::new(self.peak_amplitude.finish()),
            Arc::new(self.sigma_peak_amplitude.finish()),
            Arc::new(self.summed_adc.finish()),
            Arc::new(self.integral.finish()),
            Arc::new(self.sigma_integral.finish()),
            Arc::new(self.multiplicity.finish()),
            Arc::new(self.local_index.finish()),
            Arc::new(self.goodness_of_fit.finish()),
            Arc::new(self.ndf.finish()),
        ]
    }
}

#[derive(Default)]
pub struct WireBaseCols {
    channel: UInt32Builder,
    view: UInt8Builder,
}

impl WireBaseCols {
    pub fn append(&mut self, base: WireBase) {
        self.channel.append_value(base.channel);
        self.view.append_value(base.view);
    }

    pub fn append_default(&mut self) {
        self.append(WireBase::default());
    }

    pub fn finish(&mut self) -> Vec<ArrayRef> {
        vec![Arc::new(self.channel.finish()), Arc::new(self.view.finish())]
    }
}

#[derive(Default)]
pub struct RoiCols {
    offset: UInt64Builder,
    samples: Float32Builder,
    sample_offsets: Offsets,
}

impl RoiCols {
    pub fn append(&mut self, roi: &Roi) {
        self.offset.append_value(roi.offset);
        for sample in &roi.data {
            self.samples.append_value(*sample);
        }
        self.sample_offsets.push_len(roi.data.len());
    }

    pub fn finish(&mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.offset.finish()),
            list_array(
                item_field(DataType::Float32),
                self.sample_offsets.finish(),
                Arc::new(self.samples.finish()),
            ),
        ]
    }
}

#[derive(Default)]
pub struct WireCols {
    channel: UInt32Builder,
    view: UInt8Builder,
    rois: RoiCols,
    roi_offsets: Offsets,
}

impl WireCols {
    pub fn append(&mut self, wire: &Wire) {
        self.channel.append_value(wire.channel);
        self.view.append_value(wire.view);
        for roi in &wire.rois {
            self.rois.append(roi);
        }
        self.roi_offsets.push_len(wire.rois.len());
    }

    pub fn append_default(&mut self) {
        self.channel.append_value(0);
        self.view.append_value(0);
        self.roi_offsets.push_len(0);
    }

    pub fn finish(&mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.channel.finish()),
            Arc::new(self.view.finish()),
            list_array(
                item_field(DataType::Struct(roi_fields())),
                self.roi_offsets.finish(),
                struct_array(roi_fields(), self.rois.finish(), None),
            ),
        ]
    }
}

#[derive(Default)]
pub struct RoiFlatCols {
    channel: UInt32Builder,
    view: UInt8Builder,
    offset: UInt64Builder,
    samples: Float32Builder,
    sample_offsets: Offsets,
}

impl RoiFlatCols {
    pub fn append(&mut self, roi: RoiFlatRef<'_>) {
        self.channel.append_value(roi.channel);
        self.view.append_value(roi.view);
        self.offset.append_value(roi.roi.offset);
        for sample in &roi.roi.data {
            self.samples.append_value(*sample);
        }
        self.sample_offsets.push_len(roi.roi.data.len());
    }

    pub fn append_default(&mut self) {
        self.channel.append_value(0);
        self.view.append_value(0);
        self.offset.append_value(0);
        self.sample_offsets.push_len(0);
    }

    pub fn finish(&mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.channel.finish()),
            Arc::new(self.view.finish()),
            Arc::new(self.offset.finish()),
            list_array(
                item_field(DataType::Float32),
                self.sample_offsets.finish(),
                Arc::new(self.samples.finish()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::Array;

    use super::*;

    fn wire(channel: u32, roi_lens: &[usize]) -> Wire {
        Wire {
            channel,
            view: 1,
            rois: roi_lens
                .iter()
                .map(|&len| Roi {
                    offset: 10,
                    data: vec![0.5; len],
                })
                .collect(),
        }
    }

    #[test]
    fn hit_cols_round_counts() {
        let mut cols = HitCols::default();
        cols.append(&Hit::default());
        cols.append_default();
        let arrays = cols.finish();
        assert_eq!(arrays.len(), hit_fields().len());
        assert!(arrays.iter().all(|a| a.len() == 2));
    }

    #[test]
    fn wire_cols_nest_rois() {
        let mut cols = WireCols::default();
        cols.append(&wire(3, &[2, 0, 4]));
        cols.append(&wire(4, &[1]));
        let arrays = cols.finish();

        let rois = arrays[2].as_any().downcast_ref::<ListArray>().expect("list");
        assert_eq!(rois.len(), 2);
        assert_eq!(rois.value_offsets(), &[0, 3, 4]);

        let roi_structs = rois
            .values()
            .as_any()
            .downcast_ref::<StructArray>()
            .expect("struct");
        let samples = roi_structs
            .column_by_name("data")
            .expect("data column")
            .as_any()
            .downcast_ref::<ListArray>()
            .expect("list");
        assert_eq!(samples.value_offsets(), &[0, 2, 2, 6, 7]);
    }

    #[test]
    fn finish_resets_builders() {
        let mut cols = WireCols::default();
        cols.append(&wire(1, &[1, 1]));
        let first = cols.finish();
        assert_eq!(first[0].len(), 1);

        cols.append(&wire(2, &[3]));
        let second = cols.finish();
        assert_eq!(second[0].len(), 1);
        let rois = second[2]
            .as_any()
            .downcast_ref::<ListArray>()
            .expect("list");
        assert_eq!(rois.value_offsets(), &[0, 3]);
    }
}
