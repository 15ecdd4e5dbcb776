//! Property tests for differentiable values and cost aggregation.
//!
//! Analytic Jacobians are compared against central differences on seeded random inputs.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparse_nls::{Cost, DiffScalar, DiffVector, SparseRow, VectorContext};

const STEP: f64 = 1e-6;
const TOLERANCE: f64 = 1e-6;
const SAMPLES: usize = 200;

type BinaryOp = fn(&DiffScalar<f64>, &DiffScalar<f64>) -> DiffScalar<f64>;
type UnaryOp = fn(&DiffScalar<f64>) -> DiffScalar<f64>;

/// f(x) = x0·cos(x1) + 0.5, touching columns 0 and 1
fn f(ctx: &VectorContext<f64>, with_jacobian: bool) -> DiffScalar<f64> {
    let x0 = ctx.variable(0, with_jacobian);
    let x1 = ctx.variable(1, with_jacobian);
    x0 * x1.cos() + 0.5
}

/// g(x) = exp(x1) + x2² + 1, touching columns 1 and 2; always ≥ 1
fn g(ctx: &VectorContext<f64>, with_jacobian: bool) -> DiffScalar<f64> {
    let x1 = ctx.variable(1, with_jacobian);
    let x2 = ctx.variable(2, with_jacobian);
    x1.exp() + x2.square() + 1.0
}

fn random_point(rng: &mut StdRng) -> Vec<f64> {
    (0..3).map(|_| rng.random_range(-1.5..1.5)).collect()
}

fn central_difference(point: &[f64], k: usize, eval: impl Fn(&VectorContext<f64>) -> f64) -> f64 {
    let mut plus = point.to_vec();
    let mut minus = point.to_vec();
    plus[k] += STEP;
    minus[k] -= STEP;
    (eval(&VectorContext::from_slice(&plus)) - eval(&VectorContext::from_slice(&minus)))
        / (2.0 * STEP)
}

fn assert_close(analytic: f64, numeric: f64, what: &str) {
    assert!(
        (analytic - numeric).abs() <= TOLERANCE * analytic.abs().max(1.0),
        "{what}: analytic {analytic}, numeric {numeric}"
    );
}

#[test]
fn test_binary_operators_follow_the_chain_rule() {
    let ops: [(&str, BinaryOp); 4] = [
        ("add", |a, b| a + b),
        ("sub", |a, b| a - b),
        ("mul", |a, b| a * b),
        ("div", |a, b| a / b),
    ];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..SAMPLES {
        let point = random_point(&mut rng);
        let ctx = VectorContext::from_slice(&point);
        for (name, op) in &ops {
            let h = op(&f(&ctx, true), &g(&ctx, true));
            let row = h.jacobian().expect("result of two variables has a Jacobian");
            for k in 0..3 {
                let numeric = central_difference(&point, k, |c| {
                    op(&f(c, false), &g(c, false)).value()
                });
                assert_close(row.get(k), numeric, &format!("{name} d/dx{k} at {point:?}"));
            }
        }
    }
}

#[test]
fn test_unary_functions_follow_the_chain_rule() {
    let ops: [(&str, UnaryOp); 9] = [
        ("sqrt", |a| a.sqrt()),
        ("ln", |a| a.ln()),
        ("exp", |a| a.exp()),
        ("sin", |a| a.sin()),
        ("cos", |a| a.cos()),
        ("tanh", |a| a.tanh()),
        ("atan", |a| a.atan()),
        ("powi", |a| a.powi(3)),
        ("powf", |a| a.powf(1.7)),
    ];
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..SAMPLES {
        let point = random_point(&mut rng);
        let ctx = VectorContext::from_slice(&point);
        for (name, op) in &ops {
            // g ≥ 1 keeps sqrt, ln and powf in their domain
            let h = op(&g(&ctx, true));
            let row = h.jacobian().expect("function of variables has a Jacobian");
            assert_eq!(row.get(0), 0.0, "{name} must not touch column 0");
            for k in 1..3 {
                let numeric = central_difference(&point, k, |c| op(&g(c, false)).value());
                assert_close(row.get(k), numeric, &format!("{name} d/dx{k} at {point:?}"));
            }
        }
    }
}

#[test]
fn test_mixed_constant_operands() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..SAMPLES {
        let point = random_point(&mut rng);
        let ctx = VectorContext::from_slice(&point);
        let c = rng.random_range(0.5..2.0);

        let h = 2.0 / g(&ctx, true) - f(&ctx, true) * c;
        let row = h.jacobian().expect("Jacobian survives constant operands");
        for k in 0..3 {
            let numeric = central_difference(&point, k, |x| {
                (2.0 / g(x, false) - f(x, false) * c).value()
            });
            assert_close(row.get(k), numeric, &format!("d/dx{k} at {point:?}"));
        }
    }
}

#[test]
fn test_tie_averages_both_jacobians() {
    let a = DiffScalar::new(2.0, Some(SparseRow::new(vec![0, 3], vec![1.0, 4.0])));
    let b = DiffScalar::new(2.0, Some(SparseRow::new(vec![1, 3], vec![6.0, -2.0])));

    for tied in [a.max(&b), a.min(&b), b.max(&a)] {
        assert_eq!(tied.value(), 2.0);
        let row = tied.jacobian().expect("tie keeps a Jacobian");
        assert_eq!(row.indices(), &[0, 1, 3]);
        assert_eq!(row.values(), &[0.5, 3.0, 1.0]);
    }

    // max(f, f) is f itself
    let same = a.max(&a);
    assert_eq!(same.jacobian(), a.jacobian());

    // Without a tie the winner's Jacobian passes through untouched
    let c = DiffScalar::new(2.5, Some(SparseRow::new(vec![7], vec![1.0])));
    assert_eq!(a.max(&c).jacobian(), c.jacobian());
    assert_eq!(a.min(&c).jacobian(), a.jacobian());
}

#[test]
fn test_sum_is_stored_over_the_index_union() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..50 {
        let pick = |rng: &mut StdRng| -> SparseRow<f64> {
            let pairs = (0..20)
                .filter_map(|i| {
                    if rng.random_bool(0.3) {
                        Some((i, rng.random_range(0.5..2.0)))
                    } else {
                        None
                    }
                })
                .collect();
            SparseRow::from_pairs(pairs)
        };
        let ra = pick(&mut rng);
        let rb = pick(&mut rng);
        let a = DiffScalar::new(1.0, Some(ra.clone()));
        let b = DiffScalar::new(2.0, Some(rb.clone()));

        let sum = &a + &b;
        let row = sum.jacobian().expect("sum has a Jacobian");

        let mut union: Vec<usize> = ra.indices().iter().chain(rb.indices()).copied().collect();
        union.sort_unstable();
        union.dedup();
        assert_eq!(row.nnz(), union.len());
        assert_eq!(row.indices(), union.as_slice());
        for &i in &union {
            assert_eq!(row.get(i), ra.get(i) + rb.get(i));
        }
    }
}

/// r = [x0 − 1, 2·x1 + x0]
fn residual(ctx: &VectorContext<f64>, with_jacobian: bool) -> DiffVector<f64> {
    let x0 = ctx.variable(0, with_jacobian);
    let x1 = ctx.variable(1, with_jacobian);
    DiffVector::from_scalars([&x0 - 1.0, 2.0 * x1 + &x0])
}

#[test]
fn test_weight_scaling() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = VectorContext::from_slice(&[0.3, -0.4]);
    let single = |weight: f64| {
        let mut cost = Cost::new();
        cost.add(residual(&ctx, true), weight);
        cost
    };
    let light = single(1.0);
    let heavy = single(2.0);

    let ratio = heavy.value().component_div(&light.value());
    for r in ratio.iter() {
        assert!((r - 2f64.sqrt()).abs() < 1e-12);
    }

    let mut jtj_light = DMatrix::zeros(2, 2);
    let mut jtj_heavy = DMatrix::zeros(2, 2);
    light.add_dense_jtj_lower(&mut jtj_light, 1.0, None)?;
    heavy.add_dense_jtj_lower(&mut jtj_heavy, 1.0, None)?;
    for i in 0..2 {
        for j in 0..=i {
            assert!((jtj_heavy[(i, j)] - 2.0 * jtj_light[(i, j)]).abs() < 1e-12);
        }
    }

    // The minimizer does not depend on the weight.
    let mut minimizers = Vec::new();
    for weight in [1.0, 2.0] {
        let mut context = VectorContext::from_slice(&[0.3, -0.4]);
        let mut weighted = |c: &VectorContext<f64>, with_jacobian: bool| {
            let mut cost = Cost::new();
            cost.add(residual(c, with_jacobian), weight);
            cost.to_diff_data()
        };
        sparse_nls::GaussNewton::new().solve(&mut weighted, &mut context)?;
        minimizers.push(context.values().clone());
    }
    assert!((&minimizers[0] - &minimizers[1]).amax() < 1e-12);
    assert!((&minimizers[0] - DVector::from_vec(vec![1.0, -0.5])).amax() < 1e-12);
    Ok(())
}
