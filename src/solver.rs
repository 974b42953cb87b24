// src/solver.rs
// Minimum-variance weights: solve K*x = 1 by Givens-rotation QR and back
// substitution, then normalize, clamp negatives to zero, and renormalize.
// The square root is a fixed-iteration Newton loop so the arithmetic matches
// the accelerator datapath exactly.

use crate::covariance::Matrix;

const SQRT_ITERATIONS: u32 = 20;

/// Newton's method sqrt for non-negative input, fixed iteration count.
/// NaN propagates through untouched.
pub fn newton_sqrt(value: f64) -> f64 {
    debug_assert!(!(value < 0.0));
    if value == 0.0 {
        return 0.0;
    }
    let mut x = value;
    for _ in 0..SQRT_ITERATIONS {
        x = 0.5 * (x + value / x);
    }
    x
}

pub struct MinVarSolver {
    n: usize,
}

impl MinVarSolver {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Weight vector with every entry >= 0 summing to 1, or all zeros when no
    /// viable allocation exists (degenerate K). All-zero is a valid outcome,
    /// not an error.
    pub fn solve(&self, k: &Matrix) -> Vec<f64> {
        debug_assert_eq!(k.order(), self.n);
        let n = self.n;
        let mut a = k.clone();
        let mut b = vec![1.0f64; n];

        // Givens QR: zero out below-diagonal entries column by column,
        // rotating the right-hand side along.
        for i in 0..n {
            for j in (i + 1)..n {
                let a_val = a.get(i, i);
                let b_val = a.get(j, i);
                let r = newton_sqrt(a_val * a_val + b_val * b_val);
                if r == 0.0 {
                    continue;
                }
                let c = a_val / r;
                let s = b_val / r;
                for col in i..n {
                    let upper = c * a.get(i, col) + s * a.get(j, col);
                    let lower = -s * a.get(i, col) + c * a.get(j, col);
                    a.set(i, col, upper);
                    a.set(j, col, lower);
                }
                let upper = c * b[i] + s * b[j];
                b[j] = -s * b[i] + c * b[j];
                b[i] = upper;
            }
        }

        // Back substitution on the upper triangle. A zero pivot contributes
        // nothing rather than poisoning the vector with infinities.
        let mut x = vec![0.0f64; n];
        for i in (0..n).rev() {
            let mut acc = 0.0;
            for j in (i + 1)..n {
                acc += a.get(i, j) * x[j];
            }
            let pivot = a.get(i, i);
            x[i] = if pivot == 0.0 { 0.0 } else { (b[i] - acc) / pivot };
        }

        // Normalize, clamp negatives, renormalize. Either normalization
        // no-ops on a zero sum, leaving the all-zero vector.
        let sum: f64 = x.iter().sum();
        if sum != 0.0 {
            for v in &mut x {
                *v /= sum;
            }
        }
        for v in &mut x {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        let sum_pos: f64 = x.iter().sum();
        if sum_pos != 0.0 {
            for v in &mut x {
                *v /= sum_pos;
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix4(rows: [[f64; 4]; 4]) -> Matrix {
        Matrix::from_rows(&[&rows[0], &rows[1], &rows[2], &rows[3]])
    }

    #[test]
    fn newton_sqrt_tracks_libm() {
        for v in [0.0, 1e-8, 0.25, 1.0, 2.0, 123.456, 1e6] {
            let got = newton_sqrt(v);
            assert!((got - v.sqrt()).abs() <= 1e-9 * v.sqrt().max(1.0), "sqrt({v}) = {got}");
        }
    }

    #[test]
    fn identity_covariance_splits_evenly() {
        let mut k = Matrix::zeros(4);
        for i in 0..4 {
            k.set(i, i, 1.0);
        }
        let w = MinVarSolver::new(4).solve(&k);
        for v in &w {
            assert!((v - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn weights_are_nonnegative_and_sum_to_one() {
        let k = matrix4([
            [0.04, 0.01, 0.00, 0.01],
            [0.01, 0.09, 0.02, 0.00],
            [0.00, 0.02, 0.16, 0.01],
            [0.01, 0.00, 0.01, 0.02],
        ]);
        let w = MinVarSolver::new(4).solve(&k);
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum = {sum}");
        assert!(w.iter().all(|&v| v >= 0.0));
        // the lowest-variance asset takes the largest share
        let argmax = w
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(argmax, Some(3));
    }

    #[test]
    fn indefinite_matrix_still_yields_a_distribution() {
        // sign-mixed covariance estimates show up early in the run; the
        // clamp-and-renormalize step must still emit a valid distribution
        let k = matrix4([
            [-0.00428772, 0.00657654, 0.00419617, -0.00871277],
            [0.00880432, -0.01359558, -0.00871277, 0.01789856],
            [0.0043335, -0.00671387, -0.00428772, 0.00880432],
            [-0.00671387, 0.01028442, 0.00657654, -0.01359558],
        ]);
        let w = MinVarSolver::new(4).solve(&k);
        let sum: f64 = w.iter().sum();
        assert!(w.iter().all(|&v| (0.0..=1.0 + 1e-9).contains(&v)));
        assert!((sum - 1.0).abs() < 1e-6 || sum == 0.0);
    }

    #[test]
    fn all_zero_matrix_yields_all_zero_weights() {
        let w = MinVarSolver::new(4).solve(&Matrix::zeros(4));
        assert_eq!(w, vec![0.0; 4]);
    }

    #[test]
    fn zero_row_does_not_poison_the_rest() {
        let k = matrix4([
            [0.04, 0.00, 0.00, 0.00],
            [0.00, 0.00, 0.00, 0.00],
            [0.00, 0.00, 0.16, 0.00],
            [0.00, 0.00, 0.00, 0.08],
        ]);
        let w = MinVarSolver::new(4).solve(&k);
        assert!(w.iter().all(|v| v.is_finite()));
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(w[1], 0.0);
    }
}
