use std::{env, time::Instant};

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use ndarray::Array2;

use crate::{
    cli::ProgramArgs,
    engines::{join, NjAlgorithm},
    error::NjResult,
    matrix::distance_matrix::DistanceMatrix,
    tree::{builder::TreeBuilder, tree::Tree},
};

pub mod cli;
pub mod engines;
pub mod error;
pub mod matrix;
pub mod neighbor_joining;
pub mod output;
pub mod tree;
pub mod utils;

#[macro_use]
extern crate log;

/// Identifier of an original element or a synthesized ancestor.
pub type NodeId = usize;

pub fn set_log_level(matches: &ProgramArgs, is_last: bool, program_name: &str, version: &str) {
    let mut log_level = LevelFilter::Info;
    let mut specified = false;
    if matches.verbose {
        specified = true;
        log_level = LevelFilter::Debug;
    }
    if matches.quiet {
        specified = true;
        log_level = LevelFilter::Error;
    }
    if specified || is_last {
        let mut builder = Builder::new();
        builder.filter_level(log_level);
        if let Ok(filters) = env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        if builder.try_init().is_err() {
            eprintln!("Log level already set; keeping the existing logger");
        }
    }
    if is_last {
        info!("{} version {}", program_name, version);
    }
}

/// Validate `matrix`, join it with `algorithm` and build the tree, optionally
/// promoting leaves. The matrix itself is left untouched.
pub fn construct_tree(
    matrix: &DistanceMatrix,
    algorithm: NjAlgorithm,
    promote: bool,
) -> NjResult<Tree> {
    matrix.validate_for_nj()?;
    let records = join(matrix, algorithm);
    let tree = TreeBuilder::new(&records, matrix.ids())
        .with_classes(matrix.classes())
        .promote(promote)
        .build(algorithm);
    Ok(tree)
}

/// The single entry point for bindings.
///
/// - `dist`: square distance matrix (n x n)
/// - `labels`: length n
pub fn run_nj_from_memory(
    dist: Array2<f64>,
    labels: Vec<String>,
    algorithm: NjAlgorithm,
    promote: bool,
) -> Result<Tree> {
    let t0 = Instant::now();

    let matrix = DistanceMatrix::from_square(&dist, labels).context("Reading distance matrix")?;
    let tree = construct_tree(&matrix, algorithm, promote)
        .context("Performing neighbor-joining analysis")?;
    info!("Finished {} in {:?}", algorithm, t0.elapsed());
    Ok(tree)
}
