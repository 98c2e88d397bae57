use clap::ValueEnum;

pub mod distance_matrix;
pub mod pex_io;
pub mod square_reader;

/// On-disk layouts the CLI can read.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixFormat {
    /// `n`, labels, classes, then the lower triangle, `;`-separated.
    Pex,
    /// Full square table with optional header row and index column.
    Square,
}

impl MatrixFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixFormat::Pex => "pex",
            MatrixFormat::Square => "square",
        }
    }
}

impl Default for MatrixFormat {
    fn default() -> Self {
        MatrixFormat::Pex
    }
}
