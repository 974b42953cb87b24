// src/ordergen.rs
// Turns a weight vector and the latest prices into target holdings, order
// deltas, and the packed outbound batch. Owns the only copy of account state
// (cash, holdings, user_ref counter, latched weights); one cycle mutates it
// exactly once, and a degenerate cycle mutates nothing.

use crate::codec::{
    reverse_words, to_fixed_point, OrderRecord, ORDER_MSG_BYTES, ORDER_SIDE_BUY, ORDER_SIDE_NONE,
    ORDER_SIDE_SELL,
};
use zerocopy::AsBytes;

/// Degenerate cycle conditions. The cycle is skipped: no orders go out and
/// account state is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// An instrument's estimated price is zero; shares cannot be sized.
    ZeroPrice { instr: usize },
    /// Portfolio value came out non-positive.
    ZeroValue,
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degeneracy::ZeroPrice { instr } => write!(f, "zero estimated price for instrument {instr}"),
            Degeneracy::ZeroValue => write!(f, "non-positive portfolio value"),
        }
    }
}

/// One instrument's slice of a completed cycle, for the fills log.
#[derive(Debug, Clone)]
pub struct Fill {
    pub symbol: String,
    pub side: char,
    pub quantity: u64,
    pub price: f64,
}

#[derive(Debug)]
pub struct CycleOutput {
    /// 4-byte fixed-point portfolio value + one 48-byte record per
    /// instrument, already word-reversed for the wire.
    pub batch: Vec<u8>,
    pub portfolio_value: f64,
    pub fills: Vec<Fill>,
}

pub struct PortfolioState {
    pub cash: f64,
    pub holdings: Vec<u64>,
    pub next_user_ref: u32,
    pub latched_weights: Vec<f64>,
}

pub struct OrderGenerator {
    symbols: Vec<[u8; 8]>,
    state: PortfolioState,
}

impl OrderGenerator {
    pub fn new(symbols: Vec<[u8; 8]>, initial_cash: f64) -> Self {
        let n = symbols.len();
        Self {
            symbols,
            state: PortfolioState {
                cash: initial_cash,
                holdings: vec![0; n],
                next_user_ref: 1,
                latched_weights: vec![0.0; n],
            },
        }
    }

    #[inline]
    #[allow(dead_code)] // exercised by tests
    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    /// Run one decision cycle. `est_prices` size the targets, `ref_prices`
    /// go on the wire. NaN weight entries keep the previous latched value.
    pub fn cycle(
        &mut self,
        weights: &[f64],
        est_prices: &[f64],
        ref_prices: &[f64],
    ) -> Result<CycleOutput, Degeneracy> {
        let n = self.symbols.len();
        debug_assert!(weights.len() == n && est_prices.len() == n && ref_prices.len() == n);

        // Validate before latching anything so a skipped cycle is a no-op.
        for (i, &px) in est_prices.iter().enumerate() {
            if px <= 0.0 {
                return Err(Degeneracy::ZeroPrice { instr: i });
            }
        }
        let mut portfolio_value = self.state.cash;
        for i in 0..n {
            portfolio_value += self.state.holdings[i] as f64 * est_prices[i];
        }
        if portfolio_value <= 0.0 {
            return Err(Degeneracy::ZeroValue);
        }

        for i in 0..n {
            if !weights[i].is_nan() {
                self.state.latched_weights[i] = weights[i];
            }
        }

        let mut batch = Vec::with_capacity(4 + n * ORDER_MSG_BYTES);
        batch.extend_from_slice(&to_fixed_point(portfolio_value).to_be_bytes());

        let mut fills = Vec::with_capacity(n);
        let mut new_holdings = vec![0u64; n];
        let mut total_cost = 0.0f64;

        for i in 0..n {
            let desired_alloc = self.state.latched_weights[i] * portfolio_value;
            let target_shares = (desired_alloc / est_prices[i]).floor().max(0.0) as u64;
            new_holdings[i] = target_shares;
            total_cost += target_shares as f64 * est_prices[i];

            let delta = target_shares as i64 - self.state.holdings[i] as i64;
            let (side, quantity) = match delta {
                d if d > 0 => (ORDER_SIDE_BUY, d as u32),
                d if d < 0 => (ORDER_SIDE_SELL, (-d) as u32),
                _ => (ORDER_SIDE_NONE, 0),
            };

            let record = OrderRecord::new(
                self.state.next_user_ref,
                side,
                quantity,
                self.symbols[i],
                to_fixed_point(ref_prices[i]),
            );
            self.state.next_user_ref = self.state.next_user_ref.wrapping_add(1);
            batch.extend_from_slice(record.as_bytes());

            if side != ORDER_SIDE_NONE {
                fills.push(Fill {
                    symbol: String::from_utf8_lossy(&self.symbols[i]).trim_end().to_string(),
                    side: side as char,
                    quantity: quantity as u64,
                    price: ref_prices[i],
                });
            }
        }

        self.state.holdings = new_holdings;
        self.state.cash = portfolio_value - total_cost;

        reverse_words(&mut batch);
        Ok(CycleOutput { batch, portfolio_value, fills })
    }
}
