use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::EventShape;

/// Reconstructed pulse on one readout channel. Scalar fields only; immutable
/// once generated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hit {
    pub channel: u32,
    pub view: u8,
    pub start_tick: i32,
    pub end_tick: i32,
    pub peak_time: f32,
    pub sigma_peak_time: f32,
    pub rms: f32,
    pub peak_amplitude: f32,
    pub sigma_peak_amplitude: f32,
    pub summed_adc: f32,
    pub integral: f32,
    pub sigma_integral: f32,
    pub multiplicity: i16,
    pub local_index: i16,
    pub goodness_of_fit: f32,
    pub ndf: i32,
}

/// A region of interest along a wire: a position plus a run of samples.
/// Lengths vary per ROI.
#[derive(Clone, Debug, PartialEq)]
pub struct Roi {
    pub offset: u64,
    pub data: Vec<f32>,
}

/// Calibrated waveform on one channel, stored as a sequence of ROIs. The one
/// genuinely nested piece of the schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Wire {
    pub channel: u32,
    pub view: u8,
    pub rois: Vec<Roi>,
}

/// Identity-only projection of a [`Wire`], used by layouts that store wire
/// identity and ROI payload in separate tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WireBase {
    pub channel: u32,
    pub view: u8,
}

impl From<&Wire> for WireBase {
    fn from(wire: &Wire) -> Self {
        Self {
            channel: wire.channel,
            view: wire.view,
        }
    }
}

/// One logical unit of detector readout.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: u64,
    pub hits: Vec<Hit>,
    pub wires: Vec<Wire>,
}

const CHANNEL_COUNT: u32 = 15_360;
const TICKS_PER_READOUT: i32 = 6400;

/// Deterministic synthetic event source. Two generators constructed from the
/// same seed and shape produce identical event streams.
pub struct EventGenerator {
    rng: StdRng,
    shape: EventShape,
    amplitude: Normal<f32>,
    noise: Normal<f32>,
}

impl EventGenerator {
    pub fn new(seed: u32, shape: EventShape) -> Self {
        Self {
            rng: StdRng::seed_from_u64(u64::from(seed)),
            shape,
            amplitude: Normal::new(120.0, 25.0).expect("valid amplitude distribution"),
            noise: Normal::new(0.0, 2.5).expect("valid noise distribution"),
        }
    }

    pub fn generate(&mut self, id: u64) -> Event {
        let hits = (0..self.shape.hits_per_event)
            .map(|i| self.hit(i as i16))
            .collect();
        let wires = (0..self.shape.wires_per_event).map(|_| self.wire()).collect();
        Event { id, hits, wires }
    }

    fn hit(&mut self, local_index: i16) -> Hit {
        let start_tick = self.rng.random_range(0..TICKS_PER_READOUT - 64);
        let width = self.rng.random_range(4..64);
        let peak_amplitude = self.amplitude.sample(&mut self.rng).abs();
        let integral = peak_amplitude * width as f32 * 0.6;
        Hit {
            channel: self.rng.random_range(0..CHANNEL_COUNT),
            view: self.rng.random_range(0..3),
            start_tick,
            end_tick: start_tick + width,
            peak_time: start_tick as f32 + width as f32 / 2.0,
            sigma_peak_time: self.rng.random::<f32>() * 2.0,
            rms: width as f32 / 4.0,
            peak_amplitude,
            sigma_peak_amplitude: peak_amplitude * 0.05,
            summed_adc: integral + self.noise.sample(&mut self.rng),
            integral,
            sigma_integral: integral * 0.1,
            multiplicity: 1,
            local_index,
            goodness_of_fit: self.rng.random::<f32>() * 10.0,
            ndf: width - 3,
        }
    }

    fn wire(&mut self) -> Wire {
        let rois = (0..self.shape.rois_per_wire).map(|_| self.roi()).collect();
        Wire {
            channel: self.rng.random_range(0..CHANNEL_COUNT),
            view: self.rng.random_range(0..3),
            rois,
        }
    }

    fn roi(&mut self) -> Roi {
        let nominal = self.shape.samples_per_roi;
        let len = if nominal == 0 {
            0
        } else {
            self.rng.random_range(nominal.div_ceil(2)..=nominal + nominal / 2)
        };
        Roi {
            offset: u64::from(self.rng.random_range(0..TICKS_PER_READOUT as u32)),
            data: (0..len).map(|_| self.noise.sample(&mut self.rng)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_shape() -> EventShape {
        EventShape {
            hits_per_event: 7,
            wires_per_event: 5,
            rois_per_wire: 3,
            samples_per_roi: 4,
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let mut a = EventGenerator::new(42, small_shape());
        let mut b = EventGenerator::new(42, small_shape());
        for id in 0..4 {
            assert_eq!(a.generate(id), b.generate(id));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = EventGenerator::new(1, small_shape());
        let mut b = EventGenerator::new(2, small_shape());
        assert_ne!(a.generate(0), b.generate(0));
    }

    #[test]
    fn shape_is_respected() {
        let shape = small_shape();
        let event = EventGenerator::new(9, shape).generate(3);
        assert_eq!(event.id, 3);
        assert_eq!(event.hits.len(), shape.hits_per_event);
        assert_eq!(event.wires.len(), shape.wires_per_event);
        for wire in &event.wires {
            assert_eq!(wire.rois.len(), shape.rois_per_wire);
            for roi in &wire.rois {
                assert!(roi.data.len() >= 2 && roi.data.len() <= 6);
            }
        }
    }

    #[test]
    fn zero_samples_yield_empty_rois() {
        let shape = EventShape {
            samples_per_roi: 0,
            ..small_shape()
        };
        let event = EventGenerator::new(5, shape).generate(0);
        assert!(event.wires.iter().all(|w| w.rois.iter().all(|r| r.data.is_empty())));
    }
}
