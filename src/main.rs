use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, ContentArrangement, Row, Table, presets::UTF8_FULL};
use csv::WriterBuilder;
use ergodic_bounds::{
    BoundMode, DynMarginal, Marginal, MarginalSpec, QuantGapConfig, QuantGapRow,
    RayleighRow, RayleighSweepConfig, RearrangedCorners, RearrangementEngine,
    RearrangementOptions, SnrRow, SnrSweepConfig, build_marginals, discretize, mixed_marginals,
    quantization_gap_sweep, rayleigh_marginals, rayleigh_sweep, snr_sweep,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ergodic-bounds")]
#[command(
    about = "Ergodic capacity bounds for fading channels with unknown dependency",
    long_about = None
)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Homogeneous Rayleigh links, swept over the number of links.
    Rayleigh(RayleighArgs),
    /// Exponential, log-normal and chi-squared links, swept over SNR.
    Mixed(SnrArgs),
    /// Marginals loaded from a JSON file, swept over SNR.
    Custom(CustomArgs),
}

#[derive(Args, Debug, Clone)]
struct RearrangementArgs {
    /// Number of quantization levels N.
    #[arg(short = 'n', long = "num-levels", default_value_t = 1000)]
    num_levels: usize,
    /// Minimal relative variance decrease per rearrangement sweep.
    #[arg(long = "tolerance", default_value_t = 1e-12)]
    tolerance: f64,
    #[arg(long = "max-iterations", default_value_t = 500)]
    max_iterations: usize,
}

impl RearrangementArgs {
    fn options(&self) -> RearrangementOptions {
        RearrangementOptions {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

#[derive(Args, Debug)]
struct RayleighArgs {
    /// SNR in dB.
    #[arg(short = 's', long = "snr", default_value_t = 10.0)]
    snr_db: f64,
    #[arg(long = "n-min", default_value_t = 2)]
    n_min: usize,
    #[arg(long = "n-max", default_value_t = 30)]
    n_max: usize,
    /// Per-link rates (comma separated); requires n-min == n-max == count.
    #[arg(long = "rates", value_delimiter = ',')]
    rates: Option<Vec<f64>>,
    #[command(flatten)]
    rearrangement: RearrangementArgs,
    /// Level counts for the quantization-gap sweep.
    #[arg(long = "gap-levels", value_delimiter = ',', default_value = "5,10,100,1000,10000")]
    gap_levels: Vec<usize>,
    /// Number of links for the quantization-gap sweep.
    #[arg(long = "gap-n", default_value_t = 3)]
    gap_n: usize,
    #[arg(long = "gap-mode", value_enum, default_value_t = ModeArg::Worst)]
    gap_mode: ModeArg,
    #[arg(long = "no-gap", default_value_t = false)]
    no_gap: bool,
    /// Tab-separated table of the link-count sweep.
    #[arg(long = "export")]
    export: Option<PathBuf>,
    /// Tab-separated table of the quantization-gap sweep.
    #[arg(long = "gap-export")]
    gap_export: Option<PathBuf>,
    #[command(flatten)]
    dump: DumpArgs,
    /// Number of links used for --dump-matrix.
    #[arg(long = "dump-n", default_value_t = 3)]
    dump_n: usize,
}

#[derive(Args, Debug)]
struct SnrArgs {
    #[arg(long = "snr-min", default_value_t = 0)]
    snr_min_db: i32,
    #[arg(long = "snr-max", default_value_t = 20)]
    snr_max_db: i32,
    #[command(flatten)]
    rearrangement: RearrangementArgs,
    /// Skip the comonotonic and independent reference curves.
    #[arg(long = "only-ra", default_value_t = false)]
    only_ra: bool,
    #[arg(long = "samples", default_value_t = 10_000)]
    samples: usize,
    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,
    #[arg(long = "export")]
    export: Option<PathBuf>,
    #[command(flatten)]
    dump: DumpArgs,
}

#[derive(Args, Debug)]
struct CustomArgs {
    /// JSON array of marginals, e.g. [{"family":"exponential","rate":0.5}].
    marginals: PathBuf,
    #[command(flatten)]
    sweep: SnrArgs,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Write the rearranged lower/upper corner matrices as a tab-separated table.
    #[arg(long = "dump-matrix")]
    dump_matrix: Option<PathBuf>,
    #[arg(long = "dump-mode", value_enum, default_value_t = ModeArg::Worst)]
    dump_mode: ModeArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Best,
    Worst,
}

impl From<ModeArg> for BoundMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Best => BoundMode::Best,
            ModeArg::Worst => BoundMode::Worst,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Command::Rayleigh(args) => run_rayleigh(args),
        Command::Mixed(args) => {
            let marginals = mixed_marginals().map_err(|e| e.to_string())?;
            run_snr_sweep("mixed", &marginals, args)
        }
        Command::Custom(args) => {
            let marginals = load_marginals(&args.marginals)?;
            run_snr_sweep("custom", &marginals, args.sweep)
        }
    }
}

fn run_rayleigh(args: RayleighArgs) -> Result<(), String> {
    let config = RayleighSweepConfig {
        snr_db: args.snr_db,
        n_min: args.n_min,
        n_max: args.n_max,
        num_levels: args.rearrangement.num_levels,
        rates: args.rates.clone(),
        rearrangement: args.rearrangement.options(),
    };
    let rows = rayleigh_sweep(&config).map_err(|e| e.to_string())?;
    println!(
        "Ergodic capacity, Rayleigh fading, SNR={} dB, N={}:",
        args.snr_db, args.rearrangement.num_levels
    );
    println!("{}", rayleigh_table(&rows));
    if let Some(path) = &args.export {
        write_rows(path, &rows)?;
        println!("wrote {}", path.display());
    }

    if !args.no_gap {
        let gap_config = QuantGapConfig {
            snr_db: args.snr_db,
            n: args.gap_n,
            levels: args.gap_levels.clone(),
            mode: args.gap_mode.into(),
            rearrangement: args.rearrangement.options(),
        };
        let gap_rows = quantization_gap_sweep(&gap_config).map_err(|e| e.to_string())?;
        println!(
            "Quantization gap, {} case, n={}:",
            gap_config.mode, gap_config.n
        );
        println!("{}", gap_table(&gap_rows));
        if let Some(path) = &args.gap_export {
            write_rows(path, &gap_rows)?;
            println!("wrote {}", path.display());
        }
    }

    if let Some(path) = &args.dump.dump_matrix {
        let marginals =
            rayleigh_marginals(args.dump_n, None).map_err(|e| e.to_string())?;
        dump_matrices(path, &marginals, &args.rearrangement, args.dump.dump_mode.into())?;
    }
    Ok(())
}

fn run_snr_sweep<M>(label: &str, marginals: &[M], args: SnrArgs) -> Result<(), String>
where
    M: Marginal + Sync,
{
    if args.snr_min_db > args.snr_max_db {
        return Err(format!(
            "--snr-min ({}) must not exceed --snr-max ({})",
            args.snr_min_db, args.snr_max_db
        ));
    }
    let config = SnrSweepConfig {
        snr_db: (args.snr_min_db..=args.snr_max_db).map(f64::from).collect(),
        num_levels: args.rearrangement.num_levels,
        baselines: !args.only_ra,
        monte_carlo_samples: args.samples,
        seed: args.seed,
        rearrangement: args.rearrangement.options(),
    };
    let rows = snr_sweep(marginals, &config).map_err(|e| e.to_string())?;
    println!(
        "Ergodic capacity, {label} marginals (d={}), N={}:",
        marginals.len(),
        args.rearrangement.num_levels
    );
    println!("{}", snr_table(&rows));
    if let Some(path) = &args.export {
        write_rows(path, &rows)?;
        println!("wrote {}", path.display());
    }
    if let Some(path) = &args.dump.dump_matrix {
        dump_matrices(path, marginals, &args.rearrangement, args.dump.dump_mode.into())?;
    }
    Ok(())
}

fn load_marginals(path: &Path) -> Result<Vec<DynMarginal>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read marginals '{}': {e}", path.display()))?;
    let specs: Vec<MarginalSpec> = serde_json::from_str(&text)
        .map_err(|e| format!("failed to parse marginals '{}': {e}", path.display()))?;
    build_marginals(&specs).map_err(|e| e.to_string())
}

fn fmt_value(v: f64) -> String {
    format!("{v:.6}")
}

fn fmt_optional(v: Option<f64>) -> String {
    v.map(fmt_value).unwrap_or_else(|| "-".to_string())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn rayleigh_table(rows: &[RayleighRow]) -> Table {
    let mut table = new_table(vec![
        "n", "best exact", "best low", "best up", "worst low", "worst up", "comon", "iid",
    ]);
    for row in rows {
        let marker = if row.reliable { "" } else { " *" };
        table.add_row(Row::from(vec![
            Cell::new(format!("{}{marker}", row.n)),
            Cell::new(fmt_optional(row.best_exact)),
            Cell::new(fmt_value(row.best_low)),
            Cell::new(fmt_value(row.best_up)),
            Cell::new(fmt_value(row.worst_low)),
            Cell::new(fmt_value(row.worst_up)),
            Cell::new(fmt_value(row.comon)),
            Cell::new(fmt_optional(row.iid)),
        ]));
    }
    table
}

fn gap_table(rows: &[QuantGapRow]) -> Table {
    let mut table = new_table(vec!["levels", "lower", "upper", "gap"]);
    for row in rows {
        table.add_row(Row::from(vec![
            Cell::new(row.num_levels),
            Cell::new(fmt_value(row.lower)),
            Cell::new(fmt_value(row.upper)),
            Cell::new(format!("{:.3e}", row.gap)),
        ]));
    }
    table
}

fn snr_table(rows: &[SnrRow]) -> Table {
    let mut table = new_table(vec![
        "snr [dB]", "best low", "best up", "worst low", "worst up", "comon", "indep",
    ]);
    for row in rows {
        let marker = if row.reliable { "" } else { " *" };
        table.add_row(Row::from(vec![
            Cell::new(format!("{}{marker}", row.snr)),
            Cell::new(fmt_value(row.best_low)),
            Cell::new(fmt_value(row.best_up)),
            Cell::new(fmt_value(row.worst_low)),
            Cell::new(fmt_value(row.worst_up)),
            Cell::new(fmt_optional(row.comon)),
            Cell::new(fmt_optional(row.indep)),
        ]));
    }
    table
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), String> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .map_err(|e| format!("failed to create output table '{}': {e}", path.display()))?;
    for (i, row) in rows.iter().enumerate() {
        wtr.serialize(row)
            .map_err(|e| format!("failed to write table row {i}: {e}"))?;
    }
    wtr.flush()
        .map_err(|e| format!("failed to flush table writer: {e}"))?;
    Ok(())
}

fn dump_matrices<M: Marginal>(
    path: &Path,
    marginals: &[M],
    args: &RearrangementArgs,
    mode: BoundMode,
) -> Result<(), String> {
    let corners = discretize(marginals, args.num_levels).map_err(|e| e.to_string())?;
    let rearranged = RearrangementEngine::new(args.options()).rearrange_corners(&corners, mode);
    write_corner_matrices(path, &rearranged)?;
    println!(
        "wrote {mode}-case arrangement ({} x {}, {:?}) to {}",
        corners.num_levels(),
        corners.num_marginals(),
        rearranged.status(),
        path.display()
    );
    Ok(())
}

fn write_corner_matrices(path: &Path, corners: &RearrangedCorners) -> Result<(), String> {
    let lower = &corners.lower.matrix;
    let upper = &corners.upper.matrix;
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .map_err(|e| format!("failed to create matrix table '{}': {e}", path.display()))?;
    let headers = (0..lower.ncols())
        .map(|j| format!("low{j}"))
        .chain((0..upper.ncols()).map(|j| format!("up{j}")))
        .collect::<Vec<_>>();
    wtr.write_record(headers)
        .map_err(|e| format!("failed to write matrix header: {e}"))?;
    for i in 0..lower.nrows() {
        let record = lower
            .row(i)
            .iter()
            .chain(upper.row(i).iter())
            .map(|v| format!("{v:.12}"))
            .collect::<Vec<_>>();
        wtr.write_record(record)
            .map_err(|e| format!("failed to write matrix row {i}: {e}"))?;
    }
    wtr.flush()
        .map_err(|e| format!("failed to flush matrix writer: {e}"))?;
    Ok(())
}
