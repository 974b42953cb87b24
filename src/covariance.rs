// src/covariance.rs
// Incremental covariance of simple returns between successive reference-price
// vectors. Running mean and second moment are folded in with weight
// n/(n+1), so no return history is kept. The first observation only seeds
// last_prices; covariance becomes available from the second on.

/// Row-major square matrix backed by one contiguous allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self { n, data: vec![0.0; n * n] }
    }

    #[allow(dead_code)] // test constructor
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let n = rows.len();
        let mut m = Self::zeros(n);
        for (i, row) in rows.iter().enumerate() {
            debug_assert_eq!(row.len(), n);
            m.data[i * n..(i + 1) * n].copy_from_slice(row);
        }
        m
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] = v;
    }
}

pub struct CovarianceTracker {
    n_assets: usize,
    updates: u64,
    last_prices: Vec<f64>,
    mean: Vec<f64>,
    second_moment: Matrix,
    covariance: Matrix,
    returns: Vec<f64>, // scratch, reused across updates
}

impl CovarianceTracker {
    pub fn new(n_assets: usize) -> Self {
        Self {
            n_assets,
            updates: 0,
            last_prices: vec![0.0; n_assets],
            mean: vec![0.0; n_assets],
            second_moment: Matrix::zeros(n_assets),
            covariance: Matrix::zeros(n_assets),
            returns: vec![0.0; n_assets],
        }
    }

    /// Fold in one price vector. Returns true once the covariance matrix is
    /// ready for consumption; the first call only seeds the price baseline.
    pub fn update(&mut self, prices: &[f64]) -> bool {
        debug_assert_eq!(prices.len(), self.n_assets);

        if self.updates == 0 {
            self.last_prices.copy_from_slice(prices);
            self.updates = 1;
            return false;
        }

        for i in 0..self.n_assets {
            let prev = self.last_prices[i];
            self.returns[i] = (prices[i] - prev) / prev;
        }

        let n = self.updates as f64;
        for i in 0..self.n_assets {
            self.mean[i] = (n * self.mean[i] + self.returns[i]) / (n + 1.0);
        }
        for i in 0..self.n_assets {
            for j in 0..self.n_assets {
                let m = (n * self.second_moment.get(i, j) + self.returns[i] * self.returns[j]) / (n + 1.0);
                self.second_moment.set(i, j, m);
                self.covariance.set(i, j, m - self.mean[i] * self.mean[j]);
            }
        }

        self.last_prices.copy_from_slice(prices);
        self.updates += 1;
        true
    }

    #[inline]
    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn first_update_is_not_ready() {
        let mut t = CovarianceTracker::new(2);
        assert!(!t.update(&[100.0, 50.0]));
        assert!(t.update(&[101.0, 49.0]));
    }

    #[test]
    fn covariance_is_symmetric() {
        let mut t = CovarianceTracker::new(3);
        t.update(&[100.0, 200.0, 300.0]);
        for prices in [
            [101.0, 199.0, 303.0],
            [99.5, 201.0, 301.0],
            [100.7, 204.0, 299.0],
        ] {
            assert!(t.update(&prices));
            let c = t.covariance();
            for i in 0..3 {
                for j in 0..3 {
                    assert!((c.get(i, j) - c.get(j, i)).abs() < TOL);
                }
            }
        }
    }

    #[test]
    fn three_updates_match_direct_arithmetic() {
        let mut t = CovarianceTracker::new(2);
        let p0 = [100.0, 200.0];
        let p1 = [110.0, 190.0];
        let p2 = [104.5, 199.5];
        let p3 = [115.0, 210.0];

        t.update(&p0);
        t.update(&p1);
        t.update(&p2);
        t.update(&p3);

        // returns per step, computed directly
        let r = |a: f64, b: f64| (b - a) / a;
        let r1 = [r(p0[0], p1[0]), r(p0[1], p1[1])];
        let r2 = [r(p1[0], p2[0]), r(p1[1], p2[1])];
        let r3 = [r(p2[0], p3[0]), r(p2[1], p3[1])];

        // the n/(n+1) fold starts the first return at weight 1/2, so after
        // k returns the stats collapse to plain sums over k+1:
        //   mean = (r1+r2+r3)/4,  M[i][j] = (r1_i*r1_j + r2_i*r2_j + r3_i*r3_j)/4
        let mut mean_direct = [0.0f64; 2];
        let mut m_direct = [[0.0f64; 2]; 2];
        for ret in [r1, r2, r3] {
            for i in 0..2 {
                mean_direct[i] += ret[i] / 4.0;
                for j in 0..2 {
                    m_direct[i][j] += ret[i] * ret[j] / 4.0;
                }
            }
        }

        let c = t.covariance();
        for i in 0..2 {
            for j in 0..2 {
                let expect = m_direct[i][j] - mean_direct[i] * mean_direct[j];
                assert!(
                    (c.get(i, j) - expect).abs() < TOL,
                    "cov[{i}][{j}] = {} expected {expect}",
                    c.get(i, j)
                );
            }
        }
    }

    #[test]
    fn constant_prices_give_zero_covariance() {
        let mut t = CovarianceTracker::new(2);
        for _ in 0..5 {
            t.update(&[100.0, 200.0]);
        }
        let c = t.covariance();
        for i in 0..2 {
            for j in 0..2 {
                assert!(c.get(i, j).abs() < TOL);
            }
        }
    }
}
