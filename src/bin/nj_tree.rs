use anyhow::Context;
use clap::{crate_name, crate_version, Parser};

use log::{error, info};
use nj_tree::{
    cli::{ProgramArgs, ProgramSubcommand},
    neighbor_joining::neighbor_joining::NeighborJoining,
    set_log_level,
};

fn main() {
    let app = ProgramArgs::parse();

    set_log_level(&app, true, crate_name!(), crate_version!());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(app.threads)
        .build_global()
        .context("configuring the rayon thread pool");
    if let Err(err) = pool {
        error!("{:#}", err);
        std::process::exit(1);
    }
    info!("Rayon threads: {}", rayon::current_num_threads());

    // Dispatch subcommands
    let result = match app.subcommand {
        ProgramSubcommand::Nj(args) => {
            let runner = NeighborJoining::new(app.output_directory, args);
            runner.run().map(|tree| {
                info!(
                    "{}: {} nodes, total branch length {:.6}",
                    tree.algorithm(),
                    tree.len(),
                    tree.total_branch_length()
                );
            })
        }
    };

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
