use std::path::PathBuf;

use clap::Parser;
use pipe_optimizer::parse::parse_order;
use pipe_optimizer::pipeline;
use pipe_optimizer::render;
use pipe_optimizer::solver::Solver;
use pipe_optimizer::types::Catalog;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "pipe_optimizer",
    about = "1D pipe cutting optimizer: minimal offcut, then minimal cuts"
)]
struct Cli {
    /// Order file, or a directory of order files
    input: PathBuf,

    /// Available stock lengths, comma-separated (e.g. 2,3,4,5)
    #[arg(long, default_value = "2,3,4,5", value_parser = parse_catalog)]
    stock: Catalog,

    /// Solve inputs again even if an output file already exists
    #[arg(long)]
    force: bool,

    /// Print the result of a single file to stdout instead of writing files
    #[arg(long)]
    print: bool,

    /// Show an ASCII bar of each stock pipe (with --print)
    #[arg(long)]
    layout: bool,

    /// Log search details
    #[arg(short, long)]
    verbose: bool,
}

fn parse_catalog(s: &str) -> Result<Catalog, String> {
    s.parse::<Catalog>().map_err(|e| e.to_string())
}

fn print_single(cli: &Cli, solver: &Solver) {
    let text = std::fs::read_to_string(&cli.input).unwrap_or_else(|e| {
        eprintln!("Error: could not read '{}': {}", cli.input.display(), e);
        std::process::exit(1);
    });
    let order = parse_order(&text).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let Some(solution) = solver.solve(&order) else {
        eprintln!("Error: order cannot be cut from the available stock lengths");
        std::process::exit(1);
    };

    print!("{}", render::render_solution(&solution));
    if cli.layout {
        println!();
        for pattern in solution.patterns() {
            println!("{}", render::render_bar(pattern, solver.catalog().longest()));
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let solver = Solver::new(cli.stock.clone());

    if cli.print {
        print_single(&cli, &solver);
        return;
    }

    let inputs = pipeline::discover_inputs(&cli.input, cli.force).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if inputs.is_empty() {
        tracing::info!("nothing to do");
        return;
    }
    let summary = pipeline::run(&inputs, &solver);
    println!(
        "Summary: {} solved, {} unsatisfiable, {} rejected",
        summary.solved, summary.unsatisfiable, summary.rejected,
    );
    if summary.has_failures() {
        eprintln!(
            "Error: {} result file{} could not be written",
            summary.write_failures,
            if summary.write_failures == 1 { "" } else { "s" },
        );
        std::process::exit(1);
    }
}
