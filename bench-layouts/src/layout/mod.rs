//! The layout catalog: every physical encoding of the logical event schema,
//! plus the transforms between logical and physical shapes. A variant is the
//! cross of a granularity (what one table entry means) and a grouping (how
//! many tables the event is split over).

use std::fmt;
use std::ops::Range;

use enum_iterator::{Sequence, all};
use serde::Serialize;

use crate::event::{Roi, Wire};
use crate::split::split_range;

pub mod builders;
pub mod columns;
pub mod sinks;

/// What one physical table entry corresponds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Sequence, Serialize)]
pub enum Granularity {
    /// One entry per logical event.
    Event,
    /// One entry per spill sub-entry, identified by `event * spills + spill`.
    Spill,
    /// One entry per top-level object (a hit, or a wire with its ROIs).
    TopObject,
    /// One entry per leaf element (a hit, a wire identity, or one ROI).
    Element,
}

/// How the event's data products are split over physical tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Sequence, Serialize)]
pub enum Grouping {
    /// A single table carries everything.
    All,
    /// One table per data product (hits, wires).
    PerDataProduct,
    /// Hits, wire identities and ROI payloads in three tables.
    PerGroup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutVariant {
    pub granularity: Granularity,
    pub grouping: Grouping,
}

pub const VARIANT_COUNT: usize = 12;

/// Every variant in canonical order: granularity-major
/// (event, spill, top-object, element), grouping-minor (all, per-data-product,
/// per-group). Result tables and the selection bitmask both use this order.
pub fn all_variants() -> impl Iterator<Item = LayoutVariant> {
    all::<Granularity>().flat_map(|granularity| {
        all::<Grouping>().map(move |grouping| LayoutVariant {
            granularity,
            grouping,
        })
    })
}

/// Variants selected by a bitmask over canonical positions; any negative mask
/// selects everything.
pub fn selected_variants(mask: i64) -> Vec<LayoutVariant> {
    all_variants()
        .enumerate()
        .filter(|(i, _)| mask < 0 || mask & (1 << i) != 0)
        .map(|(_, v)| v)
        .collect()
}

impl Granularity {
    fn ident(self) -> &'static str {
        match self {
            Granularity::Event => "event",
            Granularity::Spill => "spill",
            Granularity::TopObject => "object",
            Granularity::Element => "element",
        }
    }
}

impl Grouping {
    fn ident(self) -> &'static str {
        match self {
            Grouping::All => "all",
            Grouping::PerDataProduct => "product",
            Grouping::PerGroup => "group",
        }
    }
}

impl LayoutVariant {
    /// Stable identifier used for container directory names.
    pub fn ident(&self) -> String {
        format!("{}_{}", self.granularity.ident(), self.grouping.ident())
    }

    /// Human-facing label used in result tables.
    pub fn label(&self) -> String {
        format!("{}/{}", self.granularity.ident(), self.grouping.ident())
    }

    pub fn canonical_index(&self) -> usize {
        let g = match self.granularity {
            Granularity::Event => 0,
            Granularity::Spill => 1,
            Granularity::TopObject => 2,
            Granularity::Element => 3,
        };
        let s = match self.grouping {
            Grouping::All => 0,
            Grouping::PerDataProduct => 1,
            Grouping::PerGroup => 2,
        };
        g * 3 + s
    }

    /// Physical table names of this variant, in creation order.
    pub fn table_names(&self) -> &'static [&'static str] {
        match (self.granularity, self.grouping) {
            (Granularity::Event | Granularity::Spill, Grouping::All) => &["events"],
            (Granularity::TopObject, Grouping::All) => &["objects"],
            (Granularity::Element, Grouping::All) => &["elements"],
            (_, Grouping::PerDataProduct) => &["hits", "wires"],
            (_, Grouping::PerGroup) => &["hits", "wires", "rois"],
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One flattened ROI row: the owning wire's identity plus the ROI payload.
#[derive(Clone, Copy, Debug)]
pub struct RoiFlatRef<'a> {
    pub channel: u32,
    pub view: u8,
    pub roi: &'a Roi,
}

/// The nested-to-flat transform: one row per ROI, in stable order (wire
/// order, then ROI order within each wire).
pub fn flatten_rois(wires: &[Wire]) -> impl Iterator<Item = RoiFlatRef<'_>> {
    wires.iter().flat_map(|wire| {
        wire.rois.iter().map(move |roi| RoiFlatRef {
            channel: wire.channel,
            view: wire.view,
            roi,
        })
    })
}

/// Divides `total` elements over `spills` sub-entries. The remainder is
/// redistributed (the first `total % spills` sub-entries take one extra
/// element) rather than silently dropped, so element totals are preserved
/// under horizontal segmentation.
pub fn spill_slices(total: usize, spills: usize) -> impl Iterator<Item = Range<usize>> {
    split_range(0, total as u64, spills)
        .into_iter()
        .map(|r| r.start as usize..r.end as usize)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn canonical_order() {
        let idents: Vec<String> = all_variants().map(|v| v.ident()).collect();
        assert_eq!(
            idents,
            [
                "event_all",
                "event_product",
                "event_group",
                "spill_all",
                "spill_product",
                "spill_group",
                "object_all",
                "object_product",
                "object_group",
                "element_all",
                "element_product",
                "element_group",
            ]
        );
        assert_eq!(idents.len(), VARIANT_COUNT);
        for (i, variant) in all_variants().enumerate() {
            assert_eq!(variant.canonical_index(), i);
        }
    }

    #[test]
    fn mask_selection() {
        assert_eq!(selected_variants(-1).len(), VARIANT_COUNT);
        assert_eq!(selected_variants(0).len(), 0);

        let picked = selected_variants(0b101);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].ident(), "event_all");
        assert_eq!(picked[1].ident(), "event_group");
    }

    #[test]
    fn flatten_is_stable() {
        let wires = vec![
            Wire {
                channel: 7,
                view: 0,
                rois: vec![
                    Roi {
                        offset: 1,
                        data: vec![],
                    },
                    Roi {
                        offset: 2,
                        data: vec![],
                    },
                ],
            },
            Wire {
                channel: 8,
                view: 1,
                rois: vec![Roi {
                    offset: 3,
                    data: vec![],
                }],
            },
        ];
        let flat: Vec<_> = flatten_rois(&wires).collect();
        assert_eq!(flat.len(), 3);
        assert_eq!(
            flat.iter().map(|r| (r.channel, r.roi.offset)).collect::<Vec<_>>(),
            [(7, 1), (7, 2), (8, 3)]
        );
    }

    #[rstest]
    #[case(10, 4)]
    #[case(5, 2)]
    #[case(3, 7)]
    #[case(0, 2)]
    #[case(100, 1)]
    fn spill_slices_preserve_totals(#[case] total: usize, #[case] spills: usize) {
        let slices: Vec<_> = spill_slices(total, spills).collect();
        assert_eq!(slices.len(), spills);
        let covered: usize = slices.iter().map(|s| s.len()).sum();
        assert_eq!(covered, total);

        // The leading sub-entries absorb the remainder, one element each.
        let extra = total % spills;
        for (i, slice) in slices.iter().enumerate() {
            assert_eq!(slice.len(), total / spills + usize::from(i < extra));
        }
    }
}
