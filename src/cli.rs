use clap::{Args, Parser, Subcommand};

use crate::{engines::NjAlgorithm, matrix::MatrixFormat};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ProgramArgs {
    #[command(subcommand)]
    pub subcommand: ProgramSubcommand,
    #[arg(
        short,
        long,
        default_value = "1",
        global = true,
        help = "Number of threads to use."
    )]
    pub threads: usize,
    #[arg(
        short,
        long,
        default_value = "false",
        conflicts_with = "quiet",
        global = true
    )]
    pub verbose: bool,
    #[arg(
        short,
        long,
        default_value = "false",
        conflicts_with = "verbose",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short = 'd',
        long,
        default_value = "output",
        global = true,
        help = "Output directory"
    )]
    pub output_directory: String,
}

#[derive(Subcommand, Debug)]
pub enum ProgramSubcommand {
    #[clap(name = "nj", about = "Build a neighbor-joining tree from a distance matrix")]
    Nj(NjArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NjArgs {
    /// Input distance matrix file path
    #[arg(short, long, help = "Input distance matrix file path", required = true)]
    pub input: String,
    #[arg(
        short,
        long,
        help = "Input layout: semicolon lower triangle or delimited square table",
        default_value = "pex"
    )]
    pub format: MatrixFormat,
    #[arg(
        short,
        long,
        help = "Closest-pair search used by the joining loop",
        default_value = "original"
    )]
    pub algorithm: NjAlgorithm,
    #[arg(
        long,
        default_value = "false",
        help = "Collapse comb patterns by promoting leaves into ancestor positions"
    )]
    pub promote: bool,
    #[arg(
        short,
        long,
        help = "Output prefix for result files",
        default_value = "output"
    )]
    pub output_prefix: String,
}

impl Default for NjArgs {
    fn default() -> Self {
        Self {
            input: String::new(),
            format: MatrixFormat::default(),
            algorithm: NjAlgorithm::default(),
            promote: false,
            output_prefix: String::from("output"),
        }
    }
}
