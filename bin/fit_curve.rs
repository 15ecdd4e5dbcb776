use clap::{Parser, ValueEnum};
use tracing::{Level, info, warn};

use sparse_nls::{
    Cost, DiffVector, GaussNewton, GaussNewtonConfig, LinearSolverType, NlsResult, Real,
    SolverResult, VectorContext, init_logger_with_level,
};

#[derive(Parser)]
#[command(name = "fit_curve")]
#[command(about = "Fit y = a·exp(b·t) to synthetic samples with damped Gauss-Newton")]
struct Args {
    /// Number of samples
    #[arg(short, long, default_value = "200")]
    points: usize,

    /// Maximum number of Gauss-Newton iterations
    #[arg(short, long, default_value = "20")]
    iterations: usize,

    /// Diagonal regularization
    #[arg(long, default_value = "0.0")]
    reg: f64,

    /// Linear solver backend
    #[arg(short, long, value_enum, default_value = "all")]
    solver: SolverChoice,

    /// Accumulate JᵀJ densely (the Jacobian is tall)
    #[arg(long)]
    dense: bool,

    /// Also run the fit in single precision
    #[arg(long)]
    single: bool,

    /// Print the per-iteration table
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SolverChoice {
    Cholesky,
    Cg,
    All,
}

impl SolverChoice {
    fn backends(self) -> Vec<LinearSolverType> {
        match self {
            SolverChoice::Cholesky => vec![LinearSolverType::SparseCholesky],
            SolverChoice::Cg => vec![LinearSolverType::ConjugateGradient],
            SolverChoice::All => vec![
                LinearSolverType::SparseCholesky,
                LinearSolverType::ConjugateGradient,
            ],
        }
    }
}

const TRUE_A: f64 = 2.5;
const TRUE_B: f64 = -0.8;

/// Samples of the true curve on `[0, 4]` with a small deterministic perturbation.
fn samples(count: usize) -> Vec<(f64, f64)> {
    (0..count)
        .map(|i| {
            let t = 4.0 * i as f64 / count.max(2).saturating_sub(1) as f64;
            let noise = 0.01 * (7.3 * i as f64).sin();
            (t, TRUE_A * (TRUE_B * t).exp() + noise)
        })
        .collect()
}

fn fit<T: Real>(
    data: &[(f64, f64)],
    config: GaussNewtonConfig,
) -> NlsResult<(SolverResult, T, T)> {
    let data: Vec<(T, T)> = data
        .iter()
        .map(|&(t, y)| (T::from_f64(t), T::from_f64(y)))
        .collect();
    let mut residual = |ctx: &VectorContext<T>, with_jacobian: bool| {
        let a = ctx.variable(0, with_jacobian);
        let b = ctx.variable(1, with_jacobian);
        let mut cost = Cost::with_capacity(data.len());
        for &(t, y) in &data {
            let model = &a * (&b * t).exp();
            cost.add(DiffVector::from_scalars([model - y]), T::one());
        }
        cost.to_diff_data()
    };

    let mut context = VectorContext::from_slice(&[T::one(), T::zero()]);
    let result = GaussNewton::with_config(config).solve(&mut residual, &mut context)?;
    Ok((result, context.values()[0], context.values()[1]))
}

fn report<T: Real>(label: &str, outcome: NlsResult<(SolverResult, T, T)>) -> bool {
    match outcome {
        Ok((result, a, b)) => {
            info!(
                "{:<28} | {:<30} | {:>5} | {:>12.6e} | a = {:.6}, b = {:.6} | {:.2}ms",
                label,
                result.status.to_string(),
                result.iterations,
                result.final_cost,
                a.as_f64(),
                b.as_f64(),
                result.elapsed_time.as_secs_f64() * 1000.0
            );
            result.is_converged()
        }
        Err(e) => {
            warn!("{} failed", label);
            warn!("Full error chain:\n{}", e.chain());
            false
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logger_with_level(if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });

    let data = samples(args.points);
    info!(
        "Fitting y = a·exp(b·t) to {} samples (true a = {}, b = {})",
        data.len(),
        TRUE_A,
        TRUE_B
    );

    let mut runs = 0;
    let mut converged = 0;
    for backend in args.solver.backends() {
        let config = GaussNewtonConfig::new()
            .with_iterations(args.iterations)
            .with_reg(args.reg)
            .with_linear_solver_type(backend)
            .with_optimize_for_rectangular_dense_jacobian(args.dense)
            .with_log_plateau(true);

        runs += 1;
        if report(&format!("{backend} (f64)"), fit::<f64>(&data, config.clone())) {
            converged += 1;
        }
        if args.single {
            runs += 1;
            if report(&format!("{backend} (f32)"), fit::<f32>(&data, config)) {
                converged += 1;
            }
        }
    }

    if converged == runs {
        info!("All fits converged");
        Ok(())
    } else {
        Err(format!("{}/{} fits converged", converged, runs).into())
    }
}
