// src/estimator.rs
// Scalar reference price per instrument: quantity-weighted average over the
// combined bid+ask top-5 of a snapshot. Two quantity conventions exist
// because the two downstream consumers historically fed fixed-point
// quantities at different scales; Scaled divides quantities by 10^4 in both
// numerator and denominator, so the two agree analytically.

use crate::codec::from_fixed_point;
use crate::orderbook::BookSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    Raw,
    Scaled,
}

pub struct PriceEstimator {
    weighting: Weighting,
}

impl PriceEstimator {
    pub fn new(weighting: Weighting) -> Self {
        Self { weighting }
    }

    /// One price per instrument, in dollars. An instrument with zero total
    /// quantity estimates to 0.0; that is a value, not an error.
    pub fn estimate(&self, snapshot: &BookSnapshot) -> Vec<f64> {
        let scale = match self.weighting {
            Weighting::Raw => 1.0,
            Weighting::Scaled => 1.0 / 10_000.0,
        };
        snapshot
            .books
            .iter()
            .map(|view| {
                let mut weighted = 0.0f64;
                let mut total = 0.0f64;
                let sides = [
                    (&view.ask_px, &view.ask_qty),
                    (&view.bid_px, &view.bid_qty),
                ];
                for (px, qty) in sides {
                    for (&p, &q) in px.iter().zip(qty.iter()) {
                        let w = q as f64 * scale;
                        weighted += from_fixed_point(p) * w;
                        total += w;
                    }
                }
                if total > 0.0 { weighted / total } else { 0.0 }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{DepthView, SNAPSHOT_DEPTH};

    fn view(ask: [(u32, u64); SNAPSHOT_DEPTH], bid: [(u32, u64); SNAPSHOT_DEPTH]) -> DepthView {
        DepthView {
            ask_px: ask.map(|(p, _)| p),
            ask_qty: ask.map(|(_, q)| q),
            bid_px: bid.map(|(p, _)| p),
            bid_qty: bid.map(|(_, q)| q),
        }
    }

    fn snapshot_one(v: DepthView) -> BookSnapshot {
        BookSnapshot { books: vec![v] }
    }

    #[test]
    fn weighted_average_matches_hand_computation() {
        // asks: 101.00 x 10, bids: 100.00 x 30; padding zeroed out by qty=0
        let v = view(
            [(1_010_000, 10), (0, 0), (0, 0), (0, 0), (0, 0)],
            [(1_000_000, 30), (0, 0), (0, 0), (0, 0), (0, 0)],
        );
        let est = PriceEstimator::new(Weighting::Raw);
        let px = est.estimate(&snapshot_one(v));
        let expect = (101.0 * 10.0 + 100.0 * 30.0) / 40.0;
        assert!((px[0] - expect).abs() < 1e-12);
    }

    #[test]
    fn zero_total_weight_estimates_zero() {
        let v = view([(1_010_000, 0); SNAPSHOT_DEPTH], [(1_000_000, 0); SNAPSHOT_DEPTH]);
        let est = PriceEstimator::new(Weighting::Raw);
        assert_eq!(est.estimate(&snapshot_one(v)), vec![0.0]);
    }

    #[test]
    fn raw_and_scaled_agree() {
        let v = view(
            [(1_012_500, 7), (1_015_000, 3), (1_017_500, 9), (1_020_000, 1), (1_022_500, 1)],
            [(1_010_000, 12), (1_007_500, 4), (1_005_000, 2), (1_002_500, 1), (1_000_000, 1)],
        );
        let raw = PriceEstimator::new(Weighting::Raw).estimate(&snapshot_one(v));
        let scaled = PriceEstimator::new(Weighting::Scaled).estimate(&snapshot_one(v));
        assert!((raw[0] - scaled[0]).abs() < 1e-9);
    }

    #[test]
    fn instruments_estimate_independently() {
        let a = view(
            [(1_010_000, 5), (0, 0), (0, 0), (0, 0), (0, 0)],
            [(1_010_000, 5), (0, 0), (0, 0), (0, 0), (0, 0)],
        );
        let empty = view([(1_000_000, 0); SNAPSHOT_DEPTH], [(1_000_000, 0); SNAPSHOT_DEPTH]);
        let snap = BookSnapshot { books: vec![a, empty] };
        let px = PriceEstimator::new(Weighting::Raw).estimate(&snap);
        assert!((px[0] - 101.0).abs() < 1e-12);
        assert_eq!(px[1], 0.0);
    }
}
