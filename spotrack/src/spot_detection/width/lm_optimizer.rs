//! Levenberg-Marquardt least squares for small fixed-size models.

use super::linear_solver::solve;

#[derive(Debug, Clone)]
pub struct LMConfig {
    pub max_iterations: usize,
    /// Converged once the largest accepted parameter step is below this.
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step.
    pub lambda_up: f64,
    /// Damping multiplier after an accepted step.
    pub lambda_down: f64,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 1e-8,
            initial_lambda: 0.001,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Damping beyond this means no downhill step exists.
const MAX_LAMBDA: f64 = 1e10;

#[derive(Debug, Clone, Copy)]
pub struct LMResult<const N: usize> {
    pub params: [f64; N],
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// A model `f(x, y; params)` with analytic derivatives.
pub trait LMModel<const N: usize> {
    fn evaluate(&self, x: f64, y: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives with respect to each parameter.
    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; N]) -> [f64; N];

    /// Pull parameters back into their valid range after an update.
    fn constrain(&self, params: &mut [f64; N]);
}

/// Sample points `(x, y)` with observed values `z`.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl Samples {
    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| (x, y, z))
    }
}

pub fn optimize<const N: usize, M: LMModel<N>>(
    model: &M,
    samples: &Samples,
    initial_params: [f64; N],
    config: &LMConfig,
) -> LMResult<N> {
    let mut params = initial_params;
    model.constrain(&mut params);
    let mut lambda = config.initial_lambda;
    let mut chi2 = compute_chi2(model, samples, &params);
    let mut converged = false;
    let mut iterations = 0;

    let mut jacobian = Vec::with_capacity(samples.len());
    let mut residuals = Vec::with_capacity(samples.len());

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        jacobian.clear();
        residuals.clear();
        for (x, y, z) in samples.iter() {
            jacobian.push(model.jacobian_row(x, y, &params));
            residuals.push(z - model.evaluate(x, y, &params));
        }
        let (hessian, gradient) = compute_hessian_gradient(&jacobian, &residuals);

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }
        let Some(delta) = solve(&damped, &gradient) else {
            break;
        };

        let mut candidate = params;
        for (p, d) in candidate.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        model.constrain(&mut candidate);
        let new_chi2 = compute_chi2(model, samples, &candidate);

        let max_delta = delta.iter().fold(0.0f64, |a, d| a.max(d.abs()));
        if new_chi2 < chi2 {
            params = candidate;
            chi2 = new_chi2;
            lambda *= config.lambda_down;
            if max_delta < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            // A rejected step this small means we are sitting on the minimum.
            if max_delta < config.convergence_threshold {
                converged = true;
                break;
            }
            lambda *= config.lambda_up;
            if lambda > MAX_LAMBDA {
                break;
            }
        }
    }

    LMResult {
        params,
        chi2,
        converged,
        iterations,
    }
}

fn compute_chi2<const N: usize, M: LMModel<N>>(
    model: &M,
    samples: &Samples,
    params: &[f64; N],
) -> f64 {
    samples
        .iter()
        .map(|(x, y, z)| {
            let r = z - model.evaluate(x, y, params);
            r * r
        })
        .sum()
}

/// `J^T J` and `J^T r`. Only the upper triangle is accumulated, then mirrored.
#[allow(clippy::needless_range_loop)]
pub fn compute_hessian_gradient<const N: usize>(
    jacobian: &[[f64; N]],
    residuals: &[f64],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (row, &r) in jacobian.iter().zip(residuals) {
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}
