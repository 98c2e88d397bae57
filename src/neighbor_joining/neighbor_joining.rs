use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path, time::Instant};

use crate::cli::NjArgs;
use crate::construct_tree;
use crate::matrix::distance_matrix::DistanceMatrix;
use crate::matrix::square_reader::load_square_matrix;
use crate::matrix::MatrixFormat;
use crate::output::edges_writer::write_edges_to_path;
use crate::output::labels_by_id;
use crate::output::newick_writer::write_newick_to_path;
use crate::output::nexus_writer::write_nexus_to_path;
use crate::output::xml_writer::write_xml_to_path;
use crate::tree::tree::Tree;

pub struct NeighborJoining {
    out_dir: String,
    args: NjArgs,
}

impl NeighborJoining {
    pub fn new(out_dir: String, args: NjArgs) -> Self {
        NeighborJoining { out_dir, args }
    }

    pub fn run(&self) -> Result<Tree> {
        let t0 = Instant::now();

        // 1) Load distance matrix (+ parse meta)
        let (matrix, parse_meta) = self
            .load_distance_matrix(&self.args.input)
            .context("loading distance matrix")?;
        info!(
            "Loaded distance matrix: {} elements in {:.3}s",
            matrix.len(),
            parse_meta.load_sec
        );

        // 2) Join + build
        let t_tree = Instant::now();
        let tree = construct_tree(&matrix, self.args.algorithm, self.args.promote)
            .context("building neighbor-joining tree")?;
        let tree_sec = t_tree.elapsed().as_secs_f64();
        info!(
            "Built tree with {} nodes and {} edges in {:.3}s",
            tree.len(),
            tree.edges().len(),
            tree_sec
        );
        if let Err(e) = tree.check_structure() {
            warn!("{}", e);
        }
        if !tree.edges_span_tree() {
            warn!("Edge list does not span the tree as a single component");
        }

        // 3) Outputs
        let t_out = Instant::now();
        self.output_results(&matrix, &tree)
            .context("writing outputs")?;
        let out_sec = t_out.elapsed().as_secs_f64();
        info!("Wrote outputs in {:.3}s", out_sec);

        // 4) Run log
        let run_log_path = Path::new(&self.out_dir).join("run_log.json");
        let stats = self.build_run_stats(
            &parse_meta,
            &matrix,
            &tree,
            RunTimings {
                load_sec: parse_meta.load_sec,
                tree_sec,
                output_sec: out_sec,
                total_sec: t0.elapsed().as_secs_f64(),
            },
        );
        fs::write(&run_log_path, serde_json::to_string_pretty(&stats)?)?;
        info!("Run log written: {}", run_log_path.display());

        info!("Done in {:.3}s total.", t0.elapsed().as_secs_f64());
        Ok(tree)
    }

    /* ───────────── I/O ───────────── */

    fn load_distance_matrix(&self, path: &str) -> Result<(DistanceMatrix, ParseMeta)> {
        let t_load = Instant::now();
        let (matrix, delimiter, has_header, has_index, symmetry_pairs_fixed) =
            match self.args.format {
                MatrixFormat::Pex => {
                    let m = DistanceMatrix::load(path)
                        .with_context(|| format!("reading '{}'", path))?;
                    (m, ';', true, false, 0)
                }
                MatrixFormat::Square => {
                    let (m, meta) = load_square_matrix(path)?;
                    (
                        m,
                        meta.delimiter,
                        meta.has_header,
                        meta.has_index,
                        meta.symmetry_pairs_fixed,
                    )
                }
            };
        let meta = ParseMeta {
            format: self.args.format.as_str().to_string(),
            delimiter,
            has_header,
            has_index,
            symmetry_pairs_fixed,
            load_sec: t_load.elapsed().as_secs_f64(),
        };
        Ok((matrix, meta))
    }

    fn output_results(&self, matrix: &DistanceMatrix, tree: &Tree) -> Result<()> {
        let out_dir = Path::new(&self.out_dir);
        fs::create_dir_all(out_dir).with_context(|| format!("creating {}", self.out_dir))?;

        let prefix = &self.args.output_prefix;
        let labels = labels_by_id(matrix);

        let xml_path = out_dir.join(format!("{}.xml", prefix));
        write_xml_to_path(&xml_path, tree)?;

        let newick_path = out_dir.join(format!("{}.nwk", prefix));
        write_newick_to_path(&newick_path, tree, &labels)?;

        let nexus_path = out_dir.join(format!("{}.nex", prefix));
        write_nexus_to_path(&nexus_path, matrix, tree, &labels)?;

        let edges_path = out_dir.join(format!("{}_edges.csv", prefix));
        write_edges_to_path(&edges_path, tree)?;

        info!("Outputs:");
        for p in [&xml_path, &newick_path, &nexus_path, &edges_path] {
            info!("  {}", p.display());
        }
        Ok(())
    }

    /* ───────────── run_log helpers ───────────── */

    fn build_run_stats(
        &self,
        parse: &ParseMeta,
        matrix: &DistanceMatrix,
        tree: &Tree,
        timings: RunTimings,
    ) -> RunLog {
        let n = matrix.len();
        RunLog {
            input: self.args.input.clone(),
            out_dir: self.out_dir.clone(),
            algorithm: tree.algorithm().to_string(),
            promote: self.args.promote,
            matrix: MatrixMeta {
                n,
                npairs: n * n.saturating_sub(1) / 2,
                format: parse.format.clone(),
                delimiter: parse.delimiter.to_string(),
                has_header: parse.has_header,
                has_index: parse.has_index,
                symmetry_pairs_fixed: parse.symmetry_pairs_fixed,
                min_distance: matrix.min_distance(),
                max_distance: matrix.max_distance(),
            },
            tree: TreeMeta {
                num_nodes: tree.len(),
                num_valid_nodes: tree.number_of_valid_nodes(),
                num_edges: tree.edges().len(),
                max_level: tree.max_level(),
                root: tree.root_id(),
                edges_span_tree: tree.edges_span_tree(),
                total_branch_length: tree.total_branch_length(),
            },
            timings,
            system: system_stats(),
        }
    }
}

/* ───────────── metadata + logging structs ───────────── */

#[derive(Serialize, Clone)]
struct ParseMeta {
    format: String,
    delimiter: char,
    has_header: bool,
    has_index: bool,
    symmetry_pairs_fixed: usize,
    load_sec: f64,
}

#[derive(Serialize)]
struct MatrixMeta {
    n: usize,
    npairs: usize,
    format: String,
    delimiter: String,
    has_header: bool,
    has_index: bool,
    symmetry_pairs_fixed: usize,
    min_distance: f64,
    max_distance: f64,
}

#[derive(Serialize)]
struct TreeMeta {
    num_nodes: usize,
    num_valid_nodes: usize,
    num_edges: usize,
    max_level: usize,
    root: Option<usize>,
    edges_span_tree: bool,
    total_branch_length: f64,
}

#[derive(Serialize)]
struct RunTimings {
    load_sec: f64,
    tree_sec: f64,
    output_sec: f64,
    total_sec: f64,
}

#[derive(Serialize)]
struct SystemStats {
    os: String,
    arch: String,
    num_cpus: usize,
    rayon_threads: usize,
    peak_rss_bytes: Option<u64>,
    current_rss_bytes: u64,
}

#[derive(Serialize)]
struct RunLog {
    input: String,
    out_dir: String,
    algorithm: String,
    promote: bool,
    matrix: MatrixMeta,
    tree: TreeMeta,
    timings: RunTimings,
    system: SystemStats,
}

/* ───────────── system / memory ───────────── */

fn system_stats() -> SystemStats {
    SystemStats {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        num_cpus: num_cpus::get(),
        rayon_threads: rayon::current_num_threads(),
        peak_rss_bytes: peak_rss_bytes(),
        current_rss_bytes: current_rss_bytes(),
    }
}

fn current_rss_bytes() -> u64 {
    use sysinfo::{ProcessesToUpdate, System};
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).map_or(0, |p| p.memory())
}

#[cfg(target_os = "linux")]
fn peak_rss_bytes() -> Option<u64> {
    // VmHWM: "<num> kB"
    let s = fs::read_to_string("/proc/self/status").ok()?;
    let rest = s.lines().find_map(|l| l.strip_prefix("VmHWM:"))?;
    let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
    Some(kb * 1024)
}

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
fn peak_rss_bytes() -> Option<u64> {
    // ru_maxrss counts bytes on macOS and kilobytes on the BSDs
    let unit: u64 = if cfg!(target_os = "macos") { 1 } else { 1024 };
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage only writes into the struct it is given
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: zero-initialised and filled in by a successful getrusage
    let usage = unsafe { usage.assume_init() };
    Some(usage.ru_maxrss as u64 * unit)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
)))]
fn peak_rss_bytes() -> Option<u64> {
    None
}

/* ───────────── tests ───────────── */
