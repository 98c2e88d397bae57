use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::Serialize;

use crate::matrix::distance_matrix::DistanceMatrix;

const DELIMITERS: [char; 5] = [',', '\t', ';', '|', ' '];
/// Leading rows looked at when deciding whether the first column holds labels.
const SNIFF_ROWS: usize = 10;
const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// What the sniffing loader found out about a square table.
#[derive(Serialize, Clone, Debug)]
pub struct SquareMeta {
    pub delimiter: char,
    pub has_header: bool,
    pub has_index: bool,
    pub symmetry_pairs_fixed: usize,
}

/// Read a full square matrix delimited by `,`, tab, `;`, `|` or space. Header row
/// and index column are optional and detected. Asymmetric pairs are averaged.
pub fn load_square_matrix<P: AsRef<Path>>(path: P) -> Result<(DistanceMatrix, SquareMeta)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    parse_square_matrix(&text)
}

pub fn parse_square_matrix(text: &str) -> Result<(DistanceMatrix, SquareMeta)> {
    let Some(sample) = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
    else {
        bail!("no data lines found");
    };
    let delimiter = sniff_delimiter(sample);
    debug!("Square matrix delimiter: {:?}", delimiter);

    let cells = read_cells(text, delimiter)?;
    if cells.is_empty() {
        bail!("square matrix has no rows");
    }
    let has_index = first_column_is_labels(&cells);
    let has_header = first_row_is_labels(&cells, has_index);
    debug!("Header row: {}, index column: {}", has_header, has_index);

    let skip_cols = usize::from(has_index);
    let skip_rows = usize::from(has_header);
    let body = &cells[skip_rows..];
    let n = body.len();

    let mut square = Array2::<f64>::zeros((n, n));
    for (r, row) in body.iter().enumerate() {
        let values = row.get(skip_cols..).unwrap_or(&[]);
        if values.len() != n {
            bail!(
                "table is not square: row {} has {} values, expected {}",
                r + skip_rows + 1,
                values.len(),
                n
            );
        }
        for (c, cell) in values.iter().enumerate() {
            square[[r, c]] = cell.parse().with_context(|| {
                format!(
                    "row {}, column {}: '{}' is not a number",
                    r + skip_rows + 1,
                    c + skip_cols + 1,
                    cell
                )
            })?;
        }
    }

    let averaged = symmetrize(&mut square);
    if averaged > 0 {
        warn!(
            "Square matrix is not symmetric; averaged {} off-diagonal pairs",
            averaged
        );
    }

    let labels = element_labels(&cells, has_header, has_index, n);
    info!("Loaded square distance matrix: {} x {}", n, n);
    let matrix = DistanceMatrix::from_square(&square, labels)?;
    Ok((
        matrix,
        SquareMeta {
            delimiter,
            has_header,
            has_index,
            symmetry_pairs_fixed: averaged,
        },
    ))
}

/// Split every non-blank, non-comment row into trimmed cells.
fn read_cells(text: &str, delimiter: char) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(text.as_bytes());

    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record.context("splitting square matrix rows")?;
        let row: Vec<String> = record.iter().map(|c| c.trim().to_owned()).collect();
        if row.iter().all(String::is_empty) || row[0].starts_with('#') {
            continue;
        }
        cells.push(row);
    }
    Ok(cells)
}

/// The candidate seen most often in `line`. Ties go to the earlier candidate and a
/// line holding none of them is read as comma separated.
fn sniff_delimiter(line: &str) -> char {
    DELIMITERS
        .iter()
        .map(|&d| (line.matches(d).count(), d))
        .fold((0, ','), |best, cand| if cand.0 > best.0 { cand } else { best })
        .1
}

fn is_number(cell: &str) -> bool {
    cell.parse::<f64>().is_ok()
}

/// Labels run down the first column when a leading cell below the first row is
/// text and at least two leading cells are text overall.
fn first_column_is_labels(cells: &[Vec<String>]) -> bool {
    let mut text_cells = cells.iter().take(SNIFF_ROWS).map(|r| !is_number(&r[0]));
    let top = text_cells.next().unwrap_or(false);
    let below = text_cells.filter(|&t| t).count();
    below >= 1 && below + usize::from(top) >= 2
}

/// Past any index column, a header holds some text or fewer numbers than the row
/// under it.
fn first_row_is_labels(cells: &[Vec<String>], has_index: bool) -> bool {
    let skip = usize::from(has_index);
    let numbers = |row: &[String]| row.iter().skip(skip).filter(|c| is_number(c)).count();
    let first = &cells[0];
    if first.iter().skip(skip).any(|c| !is_number(c)) {
        return true;
    }
    cells.get(1).is_some_and(|second| numbers(first) < numbers(second))
}

/// Labels from the header (its last `n` cells) or the index column, falling back
/// to `t1..tn`.
fn element_labels(cells: &[Vec<String>], has_header: bool, has_index: bool, n: usize) -> Vec<String> {
    let found: Vec<String> = if has_header {
        let header = &cells[0];
        header[header.len().saturating_sub(n)..].to_vec()
    } else if has_index {
        cells.iter().map(|r| r[0].clone()).collect()
    } else {
        Vec::new()
    };
    if found.len() == n {
        return found;
    }
    if !found.is_empty() {
        warn!(
            "Found {} labels for {} elements; numbering them t1..t{}",
            found.len(),
            n,
            n
        );
    }
    (1..=n).map(|i| format!("t{}", i)).collect()
}

/// Zero the diagonal and replace each mismatched pair by its mean. Returns the
/// number of pairs changed.
fn symmetrize(square: &mut Array2<f64>) -> usize {
    let n = square.nrows();
    square.diag_mut().fill(0.0);
    let mut averaged = 0;
    for i in 0..n {
        for j in i + 1..n {
            let (upper, lower) = (square[[i, j]], square[[j, i]]);
            if (upper - lower).abs() > SYMMETRY_TOLERANCE {
                let mean = (upper + lower) / 2.0;
                square[[i, j]] = mean;
                square[[j, i]] = mean;
                averaged += 1;
            }
        }
    }
    averaged
}
