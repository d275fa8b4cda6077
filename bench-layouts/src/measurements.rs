use serde::Serialize;

use crate::layout::LayoutVariant;

/// Result of one benchmarked write operation. Immutable once recorded.
#[derive(Clone, Debug, Serialize)]
pub struct WriteMeasurement {
    pub label: String,
    pub variant: LayoutVariant,
    pub threads: usize,
    pub avg_ms: f64,
    pub stddev_ms: Option<f64>,
    pub failed: bool,
    pub error: Option<String>,
}

impl WriteMeasurement {
    pub fn failure(
        label: impl Into<String>,
        variant: LayoutVariant,
        threads: usize,
        error: &anyhow::Error,
    ) -> Self {
        Self {
            label: label.into(),
            variant,
            threads,
            avg_ms: 0.0,
            stddev_ms: None,
            failed: true,
            error: Some(format!("{error:#}")),
        }
    }
}

/// Result of one benchmarked read operation: the first scan of each
/// iteration is the cold sample, the immediate repeat the warm one. Cold
/// reports a mean only.
#[derive(Clone, Debug, Serialize)]
pub struct ReadMeasurement {
    pub label: String,
    pub variant: LayoutVariant,
    pub threads: usize,
    pub cold_ms: f64,
    pub warm_avg_ms: f64,
    pub warm_stddev_ms: Option<f64>,
    pub failed: bool,
    pub error: Option<String>,
}

impl ReadMeasurement {
    pub fn failure(
        label: impl Into<String>,
        variant: LayoutVariant,
        threads: usize,
        error: &anyhow::Error,
    ) -> Self {
        Self {
            label: label.into(),
            variant,
            threads,
            cold_ms: 0.0,
            warm_avg_ms: 0.0,
            warm_stddev_ms: None,
            failed: true,
            error: Some(format!("{error:#}")),
        }
    }
}
