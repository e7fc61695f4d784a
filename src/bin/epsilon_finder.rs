//! Command line tool that finds the epsilon achieving a target reduction.
//!
//! Reads a PLY mesh and searches for the merge radius that removes
//! approximately the requested percentage of vertices.

use clap::Parser;
use pweld::prelude::*;
use pweld::KdTree;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "epsilon-finder",
    about = "Find the epsilon that reduces a mesh's vertex count by a given percentage"
)]
struct Args {
    /// Path to the input mesh (must be .ply)
    input: PathBuf,

    /// Percentage of vertices to remove (e.g. 10 for one tenth)
    percent: f64,

    /// Number of worker threads
    threads: usize,
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
    println!("Configuration:");
    println!("\t-path to dataset: {}", args.input.display());
    println!("\t-reduction rate: {}%", args.percent);
    println!("\t-number of threads: {}", args.threads);

    let mesh = read_mesh(&args.input)?;
    let index = KdTree::from_mesh(&mesh);
    let config = ThreadPoolConfig::new().with_threads(args.threads);

    let epsilon = find_epsilon(&mesh, &index, args.percent / 100.0, &config)?;
    println!("Epsilon: {}", epsilon);
    Ok(())
}
