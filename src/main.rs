use clap::{Parser, ValueEnum};
use qrsolve::output;
use qrsolve::parser::{self, MmField};
use qrsolve::solver::{Reorder, SolveOptions, SolverContext};
use qrsolve::stats::Stats;
use qrsolve::DenseArray;
use std::io;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Host,
    Cuda,
}

/// Solve a square sparse system Ax = b by QR factorization
#[derive(Parser)]
#[command(name = "qrsolve", version)]
struct Cli {
    /// Matrix Market file holding A
    matrix: String,

    /// Right-hand side b (Matrix Market array or a list of numbers)
    rhs: String,

    /// Pivots with |R(j,j)| <= tol are reported as singular
    /// [default: derived from the solve precision and max |A|]
    #[arg(long)]
    tol: Option<f64>,

    /// Factor without symmetric RCM reordering
    #[arg(long)]
    no_reorder: bool,

    /// Native solver backend
    #[arg(long, value_enum, default_value_t = Backend::Host)]
    backend: Backend,

    /// CUDA device ordinal
    #[arg(long, default_value_t = 0)]
    device: usize,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let t = Instant::now();
    let matrix_text = std::fs::read_to_string(&cli.matrix).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", cli.matrix, e);
        std::process::exit(1);
    });
    let rhs_text = std::fs::read_to_string(&cli.rhs).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", cli.rhs, e);
        std::process::exit(1);
    });
    let mm = parser::parse_matrix_market(&matrix_text).unwrap_or_else(|e| {
        eprintln!("{}: {}", cli.matrix, e);
        std::process::exit(1);
    });
    let b = parser::parse_vector(&rhs_text).unwrap_or_else(|e| {
        eprintln!("{}: {}", cli.rhs, e);
        std::process::exit(1);
    });
    if let Some(s) = stats.as_mut() {
        s.add_phase("Read input", t.elapsed());
    }

    let options = SolveOptions {
        tol: cli.tol,
        reorder: if cli.no_reorder {
            Reorder::None
        } else {
            Reorder::Symrcm
        },
    };
    let mut ctx = open_context(cli.backend, cli.device);
    ctx.set_options(options);

    let t = Instant::now();
    let b = DenseArray::from_vec(b);
    let solved = match mm.field {
        MmField::Integer => mm.to_csr_i64().and_then(|a| {
            record_system(stats.as_mut(), a.nrows, a.nnz());
            ctx.lsqr(&a, &b)
        }),
        MmField::Real | MmField::Pattern => {
            let a = mm.to_csr_f64();
            record_system(stats.as_mut(), a.nrows, a.nnz());
            ctx.lsqr(&a, &b)
        }
    };
    let result = solved.unwrap_or_else(|e| {
        eprintln!("Solve error: {}", e);
        std::process::exit(1);
    });
    if let Some(s) = stats.as_mut() {
        s.add_phase("Solve", t.elapsed());
        s.backend = ctx.backend_name();
        s.allocations = ctx.allocations();
        s.native_calls = ctx.native_calls();
    }

    let mut stdout = io::stdout();
    output::write_summary_csv(&result, &mut stdout)
        .and_then(|_| output::write_solution_csv(&result, &mut stdout))
        .unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn record_system(stats: Option<&mut Stats>, m: usize, nnz: usize) {
    if let Some(s) = stats {
        s.m = m;
        s.nnz = nnz;
    }
}

#[cfg(feature = "cuda")]
fn open_context(backend: Backend, device: usize) -> SolverContext {
    match backend {
        Backend::Host => SolverContext::host(),
        Backend::Cuda => SolverContext::cuda(device).unwrap_or_else(|e| {
            tracing::warn!(%e, "CUDA backend unavailable");
            SolverContext::unavailable(format!("CUDA device {device}: {e}"))
        }),
    }
}

#[cfg(not(feature = "cuda"))]
fn open_context(backend: Backend, _device: usize) -> SolverContext {
    match backend {
        Backend::Host => SolverContext::host(),
        Backend::Cuda => SolverContext::unavailable("qrsolve was built without the `cuda` feature"),
    }
}
