//! Command line tool that merges spatially proximate mesh vertices.
//!
//! Reads a PLY mesh, runs the selected clustering variant at a fixed epsilon
//! and reports the reduction; optionally writes the reduced mesh back out.

use clap::Parser;
use pweld::prelude::*;
use pweld::KdTree;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "merge-vertices",
    about = "Merge mesh vertices closer than epsilon into cluster centroids"
)]
struct Args {
    /// Merge radius (e.g. 0.001)
    epsilon: f64,

    /// Algorithm variant: 0 baseline, 1 forward, 2 forward-async
    #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
    variant: u8,

    /// Path to the input mesh (must be .ply)
    input: PathBuf,

    /// Number of worker threads for the parallel variants
    #[arg(default_value_t = 1)]
    threads: usize,

    /// Output path for the reduced mesh (must end in .ply)
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let variant = WeldVariant::from_index(args.variant)
        .ok_or_else(|| Error::OutOfRange(format!("unknown variant {}", args.variant)))?;

    println!("Configuration:");
    println!("\t-eps: {}", args.epsilon);
    println!("\t-variant: {:?}", variant);
    println!("\t-path to dataset: {}", args.input.display());
    println!("\t-number of threads: {}", args.threads);

    let mesh = read_mesh(&args.input)?;
    let index = KdTree::from_mesh(&mesh);

    println!("number of original vertices: {}", mesh.vertex_count());
    println!("number of original triangles: {}", mesh.triangle_count());

    let config = ThreadPoolConfig::new().with_threads(args.threads);
    let reduced = merge_vertices(&mesh, &index, args.epsilon, variant, &config)?;

    println!("number of vertices after clustering: {}", reduced.vertex_count());

    if let Some(output) = &args.output {
        println!("writing the reduced mesh to: {}", output.display());
        write_mesh(&reduced, output)?;
    }
    Ok(())
}
