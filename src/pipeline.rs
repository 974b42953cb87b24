// src/pipeline.rs
// The decision pipeline: estimate prices, fold the covariance, solve for
// weights, generate orders. Strictly sequential; snapshots are consumed in
// arrival order because the tracker and the account state carry forward
// between cycles.

use crate::covariance::CovarianceTracker;
use crate::estimator::PriceEstimator;
use crate::fills::FillRow;
use crate::metrics;
use crate::orderbook::BookSnapshot;
use crate::ordergen::{CycleOutput, Degeneracy, OrderGenerator};
use crate::solver::MinVarSolver;
use crate::util::{now_nanos, unix_seconds, BarrierFlag};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Why a cycle produced no orders. All of these are recoverable; the next
/// snapshot gets a fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSkip {
    /// Covariance tracker has only seen its baseline prices.
    WarmingUp,
    /// Solver found no viable allocation (all-zero weights).
    NoAllocation,
    Degenerate(Degeneracy),
}

pub struct DecisionPipeline {
    sizing: PriceEstimator,
    wire: PriceEstimator,
    tracker: CovarianceTracker,
    solver: MinVarSolver,
    ordergen: OrderGenerator,
}

impl DecisionPipeline {
    pub fn new(
        sizing: PriceEstimator,
        wire: PriceEstimator,
        n_assets: usize,
        symbols: Vec<[u8; 8]>,
        initial_cash: f64,
    ) -> Self {
        Self {
            sizing,
            wire,
            tracker: CovarianceTracker::new(n_assets),
            solver: MinVarSolver::new(n_assets),
            ordergen: OrderGenerator::new(symbols, initial_cash),
        }
    }

    /// Run one snapshot through every stage.
    pub fn on_snapshot(&mut self, snap: &BookSnapshot) -> Result<CycleOutput, CycleSkip> {
        let est_prices = self.sizing.estimate(snap);
        let ref_prices = self.wire.estimate(snap);

        if !self.tracker.update(&est_prices) {
            return Err(CycleSkip::WarmingUp);
        }
        let weights = self.solver.solve(self.tracker.covariance());
        if weights.iter().sum::<f64>() == 0.0 {
            return Err(CycleSkip::NoAllocation);
        }
        self.ordergen
            .cycle(&weights, &est_prices, &ref_prices)
            .map_err(CycleSkip::Degenerate)
    }
}

pub fn decide_loop(
    snapshot_rx: Receiver<BookSnapshot>,
    batch_tx: Sender<Vec<u8>>,
    fills_tx: Option<Sender<Vec<FillRow>>>,
    mut pipeline: DecisionPipeline,
    shutdown: Arc<BarrierFlag>,
) -> anyhow::Result<()> {
    while !shutdown.is_raised() {
        let snap = match snapshot_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(s) => s,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        let t0 = now_nanos();
        match pipeline.on_snapshot(&snap) {
            Ok(out) => {
                metrics::inc_cycles();
                metrics::set_portfolio_value(out.portfolio_value);
                metrics::observe_cycle_ns(now_nanos().saturating_sub(t0));
                info!(
                    "cycle complete: portfolio={:.4} orders={}",
                    out.portfolio_value,
                    out.fills.len()
                );

                if let Some(tx) = &fills_tx {
                    let ts = unix_seconds();
                    let rows: Vec<FillRow> = out
                        .fills
                        .iter()
                        .map(|f| FillRow {
                            timestamp: ts,
                            portfolio_value: out.portfolio_value,
                            symbol: f.symbol.clone(),
                            side: f.side,
                            quantity: f.quantity,
                            price: f.price,
                        })
                        .collect();
                    if !rows.is_empty() && tx.try_send(rows).is_err() {
                        warn!("fill rows dropped: writer is behind");
                    }
                }

                if batch_tx.try_send(out.batch).is_err() {
                    warn!("order batch dropped: venue sender is behind");
                }
            }
            Err(skip) => {
                metrics::inc_cycles_skipped();
                metrics::observe_cycle_ns(now_nanos().saturating_sub(t0));
                match skip {
                    CycleSkip::WarmingUp => debug!("cycle skipped: covariance warming up"),
                    CycleSkip::NoAllocation => info!("cycle skipped: no viable allocation"),
                    CycleSkip::Degenerate(d) => warn!("cycle skipped: {d}"),
                }
            }
        }
    }
    Ok(())
}
