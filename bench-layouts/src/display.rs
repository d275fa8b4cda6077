use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::measurements::{ReadMeasurement, WriteMeasurement};

#[derive(ValueEnum, Default, Clone, Debug)]
pub enum DisplayFormat {
    #[default]
    Table,
    Json,
}

/// Renders writer results, one row per variant in canonical catalog order
/// regardless of execution order. Failed rows show `FAILED` with the error
/// message on a continuation line, so partial runs stay legible.
pub fn render_write_table(measurements: &[WriteMeasurement]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Benchmark", "avg (ms)", "stddev (ms)"]);
    for m in measurements
        .iter()
        .sorted_by_key(|m| m.variant.canonical_index())
    {
        if m.failed {
            builder.push_record([m.label.clone(), "FAILED".to_string(), String::new()]);
            builder.push_record([continuation(m.error.as_deref()), String::new(), String::new()]);
        } else {
            builder.push_record([
                m.label.clone(),
                format!("{:.3}", m.avg_ms),
                format_stddev(m.stddev_ms),
            ]);
        }
    }
    finish(builder)
}

/// Reader-side companion of [`render_write_table`].
pub fn render_read_table(measurements: &[ReadMeasurement]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Benchmark", "cold (ms)", "warm avg (ms)", "warm stddev (ms)"]);
    for m in measurements
        .iter()
        .sorted_by_key(|m| m.variant.canonical_index())
    {
        if m.failed {
            builder.push_record([
                m.label.clone(),
                "FAILED".to_string(),
                String::new(),
                String::new(),
            ]);
            builder.push_record([
                continuation(m.error.as_deref()),
                String::new(),
                String::new(),
                String::new(),
            ]);
        } else {
            builder.push_record([
                m.label.clone(),
                format!("{:.3}", m.cold_ms),
                format!("{:.3}", m.warm_avg_ms),
                format_stddev(m.warm_stddev_ms),
            ]);
        }
    }
    finish(builder)
}

pub fn print_measurements_json<T: Serialize>(measurements: &[T]) -> anyhow::Result<()> {
    for measurement in measurements {
        // This has to be `println!` and go to stdout, because we capture it
        // from there.
        println!("{}", serde_json::to_string(measurement)?);
    }
    Ok(())
}

fn finish(builder: Builder) -> String {
    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

fn format_stddev(stddev: Option<f64>) -> String {
    stddev.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"))
}

fn continuation(error: Option<&str>) -> String {
    format!("  {}", error.unwrap_or("unknown error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::all_variants;

    #[test]
    fn rows_follow_canonical_order() {
        // Feed measurements in reverse execution order.
        let mut reversed: Vec<_> = all_variants().collect();
        reversed.reverse();
        let measurements: Vec<WriteMeasurement> = reversed
            .into_iter()
            .map(|variant| WriteMeasurement {
                label: variant.label(),
                variant,
                threads: 2,
                avg_ms: 1.0,
                stddev_ms: Some(0.1),
                failed: false,
                error: None,
            })
            .collect();

        let table = render_write_table(&measurements);
        let event_all = table.find("event/all").expect("first variant present");
        let element_group = table.find("element/group").expect("last variant present");
        assert!(event_all < element_group);
    }

    #[test]
    fn failed_rows_render_distinctly() {
        let variant = all_variants().next().expect("variants");
        let m = ReadMeasurement::failure("read/event/all", variant, 2, &anyhow::anyhow!("no such table"));
        let table = render_read_table(&[m]);
        assert!(table.contains("FAILED"));
        assert!(table.contains("no such table"));
    }
}
