use bregman_tree::util::{read_points, split_set};
use bregman_tree::{
    BregmanBallTree, BregmanError, DivergenceKind, MinimumSpanningTree, NearestNeighbourSearch,
    TreeParams,
};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MstMode {
    /// Boruvka comparing all pairs every round
    Naive,
    /// Boruvka over a precomputed weight matrix
    NaiveMatrix,
    /// Single-tree Boruvka
    Stb,
    /// Dual-tree Boruvka
    Dtb,
}

/// Nearest neighbours and minimum spanning trees under a Bregman divergence.
#[derive(Parser, Debug)]
#[command(name = "bbtree")]
struct Args {
    /// Reference points, one per line
    #[arg(long)]
    rfile: PathBuf,

    /// Query points. Without this a random share of the reference points is used as queries
    #[arg(long)]
    qfile: Option<PathBuf>,

    /// L2 or KL
    #[arg(long, default_value = "L2")]
    divergence: DivergenceKind,

    /// Number of neighbours per query
    #[arg(long, default_value_t = 1)]
    k: usize,

    /// Maximum number of points in a leaf of the tree
    #[arg(long, default_value_t = 10)]
    leaf_size: usize,

    /// Share of the reference points used as queries when no query file is given
    #[arg(long)]
    split_ratio: Option<f64>,

    /// Seed for splitting the data and building the tree
    #[arg(long)]
    seed: Option<u64>,

    /// Also compute the minimum spanning tree of the reference points
    #[arg(long, value_enum)]
    mst: Option<MstMode>,
}

const SPLIT_RATIO_DEFAULT: f64 = 0.1;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), BregmanError> {
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let points: Vec<Vec<f64>> = read_points(&args.rfile)?;

    let (queries, references) = match &args.qfile {
        Some(qfile) => {
            if args.split_ratio.is_some() {
                warn!("--split-ratio is ignored when a query file is given");
            }
            (read_points(qfile)?, points)
        }
        None => {
            let mut rng = StdRng::seed_from_u64(seed);
            split_set(&points, args.split_ratio.unwrap_or(SPLIT_RATIO_DEFAULT), &mut rng)?
        }
    };
    info!(
        "{} reference points, {} queries, {:?} divergence",
        references.len(),
        queries.len(),
        args.divergence
    );

    let params = TreeParams::builder()
        .max_leaf_size(args.leaf_size)
        .seed(seed)
        .build();
    let mut tree: BregmanBallTree<f64, DivergenceKind> =
        BregmanBallTree::build(&references, &params, args.divergence)?;
    info!(
        "Built tree with {} leaves and depth {}",
        tree.leaf_count(),
        tree.depth()
    );

    let search = NearestNeighbourSearch::new(&tree);
    let mut mismatches = 0;
    for (n, query) in queries.iter().enumerate() {
        let neighbours = search.compute_k_neighbours(query, args.k)?;
        let expected = search.compute_k_neighbours_naive(query, args.k)?;
        let agrees = neighbours.len() == expected.len()
            && neighbours
                .iter()
                .zip(expected.iter())
                .all(|(a, b)| (a.1 - b.1).abs() <= 1e-12 * b.1.abs().max(1.0));
        if !agrees {
            mismatches += 1;
            warn!("Query {n}: tree search disagrees with exhaustive search");
        }
        if neighbours.is_empty() {
            println!("{n}: none");
        } else {
            let formatted: Vec<String> = neighbours
                .iter()
                .map(|(index, divergence)| format!("{index} ({divergence})"))
                .collect();
            println!("{n}: {}", formatted.join(" "));
        }
    }
    info!(
        "{} of {} queries agree with exhaustive search",
        queries.len() - mismatches,
        queries.len()
    );

    if let Some(mode) = args.mst {
        let mut mst = MinimumSpanningTree::new(&mut tree);
        match mode {
            MstMode::Naive => mst.compute_naive(false),
            MstMode::NaiveMatrix => mst.compute_naive(true),
            MstMode::Stb => mst.compute_stb(),
            MstMode::Dtb => mst.compute_dtb(),
        };
        for edge in mst.edge_list() {
            println!("{} {} {}", edge.u, edge.v, edge.weight);
        }
        info!(
            "Minimum spanning tree with {} edges, total weight {}",
            mst.edge_list().len(),
            mst.total_weight()
        );
    }
    Ok(())
}
