use clap::{Parser, Subcommand};
use md_app::{
    AppError, AppResult, RunOptions, RunProgressEvent, RunRequest, RunStage, query, run_service,
};
use md_results::{OutputStore, RunStore};
use md_sim::ExtractOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "md-cli")]
#[command(about = "mdflow CLI - molecular dynamics in timeblocks", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable timing instrumentation (same as MD_TIMING=1)
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run definition
    Validate {
        /// Path to the run definition YAML file
        definition_path: PathBuf,
    },
    /// Run a simulation, reusing a cached result when the definition is unchanged
    Run {
        /// Path to the run definition YAML file
        definition_path: PathBuf,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
        /// Run store directory (defaults to .mdflow/runs next to the definition)
        #[arg(long)]
        runs_dir: Option<PathBuf>,
    },
    /// List cached runs for a run definition
    Runs {
        /// Path to the run definition YAML file
        definition_path: PathBuf,
        #[arg(long)]
        runs_dir: Option<PathBuf>,
    },
    /// Show groups, attributes and dataset shapes of recorded output
    Info {
        /// Output directory or legacy trajectory directory
        path: PathBuf,
    },
    /// Export scalar columns as CSV
    Extract {
        /// Output directory or legacy trajectory directory
        path: PathBuf,
        /// Comma-separated column names, e.g. U,K
        #[arg(long, value_delimiter = ',', default_value = "U,K")]
        columns: Vec<String>,
        /// Divide every column by the particle count
        #[arg(long)]
        per_particle: bool,
        /// Skip this many timeblocks
        #[arg(long, default_value_t = 0)]
        first_block: usize,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    if cli.timing {
        md_core::timing::enable_timing();
    }

    match cli.command {
        Commands::Validate { definition_path } => cmd_validate(&definition_path),
        Commands::Run {
            definition_path,
            no_cache,
            runs_dir,
        } => cmd_run(&definition_path, !no_cache, runs_dir),
        Commands::Runs {
            definition_path,
            runs_dir,
        } => cmd_runs(&definition_path, runs_dir),
        Commands::Info { path } => cmd_info(&path),
        Commands::Extract {
            path,
            columns,
            per_particle,
            first_block,
            output,
        } => cmd_extract(&path, &columns, per_particle, first_block, output.as_deref()),
    }
}

fn cmd_validate(definition_path: &Path) -> AppResult<()> {
    println!("Validating run definition: {}", definition_path.display());
    let def = md_project::load_yaml(definition_path)?;
    println!("✓ Run definition is valid");
    println!(
        "  {}: {} particles in {}D, {} integrator, {} x {} steps",
        def.name,
        def.configuration.lattice.num_particles(),
        def.configuration.lattice.dimension(),
        def.integrator.name(),
        def.schedule.num_timeblocks,
        def.schedule.steps_per_timeblock
    );
    Ok(())
}

fn cmd_run(definition_path: &Path, use_cache: bool, runs_dir: Option<PathBuf>) -> AppResult<()> {
    println!("Running: {}", definition_path.display());

    let request = RunRequest {
        definition_path,
        options: RunOptions {
            use_cache,
            runs_dir,
            ..RunOptions::default()
        },
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::ensure_run_with_progress(
        &request,
        Some(&mut |event| {
            let emit_now = Some(event.stage) != last_stage
                || event.block.is_some()
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Simulation completed: {}", response.run_id);
    }
    let m = &response.manifest;
    println!(
        "  {} particles in {}D, {}, dt = {}, {} x {} steps",
        m.n, m.d, m.integrator, m.dt, m.num_timeblocks, m.steps_per_timeblock
    );
    if let Some(summary) = &response.summary {
        println!("  <U>/N = {:.6}", summary.mean_u);
        println!("  <K>/N = {:.6}", summary.mean_k);
        println!("  Energy drift: {:.3e}", summary.relative_drift);
    }
    print_timing_summary(&response.timing);
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (event.stage, event.fraction_complete()) {
        (RunStage::Running, Some(fraction)) => {
            let width = 28usize;
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            print!(
                "\r[{}] {:>6.2}%  block={}/{}  elapsed={:.1}s",
                bar,
                fraction * 100.0,
                event.block.unwrap_or(0),
                event.num_blocks,
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
        }
    }
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &md_app::RunTimingSummary) {
    println!("\nTiming summary:");
    if timing.load_cache_time_s > 0.0 {
        println!("  Cache load: {:.3}s", timing.load_cache_time_s);
    } else {
        println!("  Build:   {:.3}s", timing.build_time_s);
        println!("  Setup:   {:.3}s", timing.setup_time_s);
        println!("  Run:     {:.3}s", timing.run_time_s);
        println!("  Flush:   {:.3}s", timing.flush_time_s);
        println!(
            "  Steps:   {} ({:.1} steps/s)",
            timing.steps, timing.steps_per_second
        );
        println!("  Neighbor list rebuilds: {}", timing.neighbor_rebuilds);
    }
    println!("  Total:   {:.3}s", timing.total_time_s);
}

fn cmd_runs(definition_path: &Path, runs_dir: Option<PathBuf>) -> AppResult<()> {
    let store = match runs_dir {
        Some(dir) => RunStore::new(dir)?,
        None => {
            let def = md_project::load_yaml(definition_path)?;
            run_service::open_run_store(definition_path, &def, &RunOptions::default())?
        }
    };
    let runs = run_service::list_runs(&store)?;
    if runs.is_empty() {
        println!("No cached runs in {}", store.root().display());
    } else {
        println!("Cached runs in {}:", store.root().display());
        for m in runs {
            println!("  {} {:?} {} ({})", m.run_id, m.status, m.name, m.timestamp);
        }
    }
    Ok(())
}

fn open_output(path: &Path) -> AppResult<Box<dyn OutputStore>> {
    match md_results::open_trajectory(path)? {
        Some(store) => Ok(Box::new(store)),
        None => Err(AppError::InvalidInput(format!(
            "{} is not an output directory or legacy trajectory",
            path.display()
        ))),
    }
}

fn cmd_info(path: &Path) -> AppResult<()> {
    let store = open_output(path)?;
    print!("{}", query::describe_output(store.as_ref()));
    Ok(())
}

fn cmd_extract(
    path: &Path,
    columns: &[String],
    per_particle: bool,
    first_block: usize,
    output: Option<&Path>,
) -> AppResult<()> {
    let store = open_output(path)?;
    let options = ExtractOptions {
        per_particle,
        first_block,
        ..ExtractOptions::default()
    };
    let csv = query::scalars_csv(store.as_ref(), columns, options)?;

    if let Some(path) = output {
        std::fs::write(path, &csv)?;
        println!(
            "✓ Exported {} rows to {}",
            csv.lines().count().saturating_sub(1),
            path.display()
        );
    } else {
        print!("{}", csv);
    }
    Ok(())
}
