//! Linear solver backend comparison on a synthetic odometry chain.
//!
//! The problem has `n` scalar poses linked by relative measurements, a prior on the first
//! pose and one loop closure between the ends:
//!
//! ```text
//! r_prior = x_0
//! r_i     = sin(x_{i+1} − x_i) − sin(d_i)      i = 0..n−1
//! r_loop  = x_{n−1} − x_0 − Σ d_i
//! ```
//!
//! Every backend starts from the same perturbed guess. Timing covers `solve()` only and is
//! averaged over several runs.

use std::hint::black_box;
use web_time::Instant;

use sparse_nls::{
    Cost, DiffVector, GaussNewton, GaussNewtonConfig, LinearSolverType, VectorContext,
    init_logger,
};
use tracing::{info, warn};

const RUNS: usize = 5;

struct Chain {
    steps: Vec<f64>,
}

impl Chain {
    fn new(poses: usize) -> Self {
        let steps = (0..poses.saturating_sub(1))
            .map(|i| 0.1 + 0.05 * (0.37 * i as f64).cos())
            .collect();
        Self { steps }
    }

    fn poses(&self) -> usize {
        self.steps.len() + 1
    }

    fn initial_guess(&self) -> VectorContext<f64> {
        let mut x = 0.0;
        let mut values = vec![0.0];
        for (i, d) in self.steps.iter().enumerate() {
            x += d * (1.0 + 0.2 * (1.3 * i as f64).sin());
            values.push(x);
        }
        VectorContext::from_slice(&values)
    }

    fn evaluate(&self, ctx: &VectorContext<f64>, with_jacobian: bool) -> DiffVector<f64> {
        let n = self.poses();
        let mut cost = Cost::with_capacity(3);

        cost.add(
            DiffVector::from_scalars([ctx.variable(0, with_jacobian)]),
            100.0,
        );

        let odometry = self.steps.iter().enumerate().map(|(i, &d)| {
            let delta = ctx.variable(i + 1, with_jacobian) - ctx.variable(i, with_jacobian);
            delta.sin() - d.sin()
        });
        cost.add(DiffVector::from_scalars(odometry), 1.0);

        let total: f64 = self.steps.iter().sum();
        let closure =
            ctx.variable(n - 1, with_jacobian) - ctx.variable(0, with_jacobian) - total;
        cost.add(DiffVector::from_scalars([closure]), 10.0);

        cost.to_diff_data()
    }
}

struct BenchResult {
    poses: usize,
    backend: String,
    iterations: usize,
    final_cost: f64,
    time_ms: f64,
    status: String,
}

fn run(chain: &Chain, label: &str, config: &GaussNewtonConfig) -> Option<BenchResult> {
    let mut total_ms = 0.0;
    let mut last = None;
    for _ in 0..RUNS {
        let mut context = chain.initial_guess();
        let mut evaluator =
            |ctx: &VectorContext<f64>, with_jacobian: bool| chain.evaluate(ctx, with_jacobian);
        let mut solver = GaussNewton::with_config(config.clone());

        let start = Instant::now();
        let outcome = solver.solve(&mut evaluator, black_box(&mut context));
        total_ms += start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(result) => last = Some(result),
            Err(e) => {
                warn!("{} on {} poses failed: {}", label, chain.poses(), e.chain_compact());
                return None;
            }
        }
    }

    last.map(|result| BenchResult {
        poses: chain.poses(),
        backend: label.to_string(),
        iterations: result.iterations,
        final_cost: result.final_cost,
        time_ms: total_ms / RUNS as f64,
        status: if result.is_converged() {
            "CONVERGED".to_string()
        } else {
            result.status.to_string()
        },
    })
}

fn print_table(results: &[BenchResult]) {
    info!(
        "{:<8} | {:<24} | {:<5} | {:<12} | {:<10} | {:<12}",
        "Poses", "Backend", "Iters", "Final Cost", "Time(ms)", "Status"
    );
    info!("{}", "-".repeat(86));
    for r in results {
        info!(
            "{:<8} | {:<24} | {:<5} | {:<12.6e} | {:<10.2} | {:<12}",
            r.poses, r.backend, r.iterations, r.final_cost, r.time_ms, r.status
        );
    }
    info!("{}", "-".repeat(86));
}

fn main() {
    init_logger();

    let base = GaussNewtonConfig::new().with_iterations(20);
    let mut results = Vec::new();

    for poses in [100, 1_000, 5_000] {
        let chain = Chain::new(poses);

        let mut backends = vec![
            ("Sparse Cholesky", base.clone()),
            (
                "Conjugate Gradient",
                base.clone()
                    .with_linear_solver_type(LinearSolverType::ConjugateGradient)
                    .with_cg_iterations(2 * poses),
            ),
        ];
        if poses <= 1_000 {
            backends.push((
                "Dense Cholesky",
                base.clone().with_optimize_for_rectangular_dense_jacobian(true),
            ));
        }

        for (label, config) in &backends {
            if let Some(result) = run(&chain, label, config) {
                results.push(result);
            }
        }
    }

    print_table(&results);
}
