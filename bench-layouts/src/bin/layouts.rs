use std::path::PathBuf;

use bench_layouts::bench_run::{benchmark_read, benchmark_write};
use bench_layouts::config::{BenchParams, EventShape, WriteOptions};
use bench_layouts::display::{
    DisplayFormat, print_measurements_json, render_read_table, render_write_table,
};
use bench_layouts::layout::selected_variants;
use bench_layouts::read::read_variant;
use bench_layouts::write::write_variant;
use bench_layouts::{default_env_filter, feature_flagged_allocator, setup_logger};
use clap::Parser;
use indicatif::ProgressBar;

feature_flagged_allocator!();

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value_t = 1000)]
    events: usize,
    #[arg(long, default_value_t = 100)]
    hits_per_event: usize,
    #[arg(long, default_value_t = 100)]
    wires_per_event: usize,
    #[arg(long, default_value_t = 10)]
    rois_per_wire: usize,
    #[arg(long, default_value_t = 32)]
    samples_per_roi: usize,
    #[arg(long, default_value_t = 4)]
    spills: usize,
    #[arg(short, long, default_value_t = 4)]
    threads: usize,
    #[arg(short, long, default_value_t = 5)]
    iterations: usize,
    /// Bitmask over canonical variant positions; -1 runs everything.
    #[arg(long, default_value_t = -1)]
    variants: i64,
    #[arg(long, default_value_t = 4096)]
    rows_per_cluster: usize,
    #[arg(long, default_value = "layout-bench-data")]
    output_dir: PathBuf,
    #[arg(short, long)]
    verbose: bool,
    #[arg(short, long, default_value_t, value_enum)]
    display_format: DisplayFormat,
}

fn main() {
    let args = Args::parse();

    let filter = default_env_filter(args.verbose);
    setup_logger(filter);

    let params = BenchParams {
        num_events: args.events,
        shape: EventShape {
            hits_per_event: args.hits_per_event,
            wires_per_event: args.wires_per_event,
            rois_per_wire: args.rois_per_wire,
            samples_per_roi: args.samples_per_roi,
        },
        spills: args.spills,
        threads: args.threads,
        iterations: args.iterations,
    };
    let opts = WriteOptions {
        rows_per_cluster: args.rows_per_cluster,
    };

    let variants = selected_variants(args.variants);
    let progress = ProgressBar::new((variants.len() * 2) as u64);

    let mut write_measurements = Vec::with_capacity(variants.len());
    let mut read_measurements = Vec::with_capacity(variants.len());

    for variant in variants {
        tracing::info!("Running {variant} benchmark");
        let container = args.output_dir.join(variant.ident());

        let write_label = format!("write/{variant}");
        write_measurements.push(benchmark_write(
            &write_label,
            variant,
            params.threads,
            params.iterations,
            || write_variant(variant, &params, &opts, &container),
        ));
        progress.inc(1);

        let read_label = format!("read/{variant}");
        read_measurements.push(benchmark_read(
            &read_label,
            variant,
            params.threads,
            params.iterations,
            || {
                let cold = read_variant(variant, &container, params.threads)?;
                let warm = read_variant(variant, &container, params.threads)?;
                Ok((cold.elapsed, warm.elapsed))
            },
        ));
        progress.inc(1);
    }

    progress.finish();

    match args.display_format {
        DisplayFormat::Table => {
            println!("{}", render_write_table(&write_measurements));
            println!("{}", render_read_table(&read_measurements));
        }
        DisplayFormat::Json => {
            print_measurements_json(&write_measurements).unwrap();
            print_measurements_json(&read_measurements).unwrap();
        }
    }
}
