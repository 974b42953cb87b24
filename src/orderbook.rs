// src/orderbook.rs
// Passive-liquidity books for a fixed instrument universe: a fixed-capacity
// order registry shared across instruments, one bid/ask ladder pair per
// instrument, and the engine that routes feed events and publishes top-5
// snapshots. One writer owns all of this; bubble-up is not atomic across the
// tree, so mutation is never concurrent.

use crate::codec::{Event, Side};
use crate::config::InstrumentCfg;
use crate::ladder::{LadderSide, PriceLadder};

pub const SNAPSHOT_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Never carried an order.
    Unused,
    Active,
    /// Fully cancelled/executed/deleted; the id is not re-added.
    Retired,
}

#[derive(Debug, Clone, Copy)]
struct OrderSlot {
    state: SlotState,
    instr: u32,
    side: Side,
    level: u32,
    remaining: u64,
}

const EMPTY_SLOT: OrderSlot = OrderSlot {
    state: SlotState::Unused,
    instr: 0,
    side: Side::Bid,
    level: 0,
    remaining: 0,
};

/// Fixed-capacity order table indexed by order reference. Invariant:
/// `remaining == 0` exactly when the slot is not Active.
pub struct OrderRegistry {
    slots: Vec<OrderSlot>,
}

impl OrderRegistry {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![EMPTY_SLOT; capacity] }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, order_ref: u32) -> Option<&OrderSlot> {
        self.slots.get(order_ref as usize)
    }

    #[inline]
    pub fn is_active(&self, order_ref: u32) -> bool {
        matches!(self.slot(order_ref), Some(s) if s.state == SlotState::Active)
    }

    #[inline]
    #[allow(dead_code)] // exercised by tests
    pub fn remaining(&self, order_ref: u32) -> u64 {
        self.slot(order_ref).map_or(0, |s| s.remaining)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Active).count()
    }
}

/// Why an Add was dropped. Capacity misses are reported; the rest of the
/// taxonomy stays silent per the feed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddReject {
    Capacity,
    UnknownInstrument,
    RetiredRef,
}

pub struct InstrumentBook {
    pub bid: PriceLadder,
    pub ask: PriceLadder,
}

impl InstrumentBook {
    pub fn new(cfg: &InstrumentCfg) -> Self {
        Self {
            bid: PriceLadder::new(LadderSide::Bid, cfg.min_price, cfg.tick, cfg.levels),
            ask: PriceLadder::new(LadderSide::Ask, cfg.min_price, cfg.tick, cfg.levels),
        }
    }

    #[inline]
    fn ladder_mut(&mut self, side: Side) -> &mut PriceLadder {
        match side {
            Side::Bid => &mut self.bid,
            Side::Ask => &mut self.ask,
        }
    }
}

/// Top-5 per side for one instrument. Missing levels are padded with the
/// side's worst price and quantity 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthView {
    pub ask_px: [u32; SNAPSHOT_DEPTH],
    pub ask_qty: [u64; SNAPSHOT_DEPTH],
    pub bid_px: [u32; SNAPSHOT_DEPTH],
    pub bid_qty: [u64; SNAPSHOT_DEPTH],
}

/// Consistent copy of every instrument's visible depth, taken at one instant
/// by the book writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    pub books: Vec<DepthView>,
}

/// Summary of one applied event, for accounting at the call site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub add_rejected: Option<AddReject>,
    pub snapshot_due: bool,
}

pub struct BookEngine {
    books: Vec<InstrumentBook>,
    registry: OrderRegistry,
    publish_threshold: u32,
    adds_since_publish: u32,
}

impl BookEngine {
    pub fn new(instruments: &[InstrumentCfg], registry_capacity: usize, publish_threshold: u32) -> Self {
        Self {
            books: instruments.iter().map(InstrumentBook::new).collect(),
            registry: OrderRegistry::new(registry_capacity),
            publish_threshold,
            adds_since_publish: 0,
        }
    }

    #[inline]
    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    /// Apply one feed event in arrival order. Invalid references and unknown
    /// instruments are no-ops; `Applied` carries what the caller may want to
    /// count. `snapshot_due` fires once per `publish_threshold` Adds.
    pub fn apply(&mut self, ev: &Event) -> Applied {
        let mut applied = Applied::default();
        match *ev {
            Event::Add { instr, order_ref, side, qty, px } => {
                if let Err(reject) = self.add_order(instr, order_ref, px, qty, side) {
                    applied.add_rejected = Some(reject);
                }
                // every Add event counts toward publication, accepted or not
                self.adds_since_publish += 1;
                if self.adds_since_publish >= self.publish_threshold {
                    self.adds_since_publish = 0;
                    applied.snapshot_due = true;
                }
            }
            Event::Cancel { instr, order_ref, qty } => {
                self.cancel_order(instr, order_ref, Some(qty));
            }
            Event::Execute { instr, order_ref, qty } => {
                self.execute_order(instr, order_ref, qty);
            }
            Event::Delete { instr, order_ref } => {
                self.delete_order(instr, order_ref);
            }
        }
        applied
    }

    pub fn add_order(
        &mut self,
        instr: u32,
        order_ref: u32,
        price: u32,
        quantity: u64,
        side: Side,
    ) -> Result<(), AddReject> {
        if order_ref as usize >= self.registry.capacity() {
            return Err(AddReject::Capacity);
        }
        let book = self.books.get_mut(instr as usize).ok_or(AddReject::UnknownInstrument)?;
        if self.registry.slots[order_ref as usize].state == SlotState::Retired {
            return Err(AddReject::RetiredRef);
        }

        let ladder = book.ladder_mut(side);
        let level = ladder.price_to_level(price);
        ladder.add_quantity(level, quantity);

        self.registry.slots[order_ref as usize] = OrderSlot {
            state: SlotState::Active,
            instr,
            side,
            level,
            remaining: quantity,
        };
        Ok(())
    }

    /// Reduce an order by `quantity` shares, or by everything when `None`.
    /// Removal is clamped to what the order still has; the actually-removed
    /// amount is returned. Non-active references remove nothing.
    pub fn cancel_order(&mut self, instr: u32, order_ref: u32, quantity: Option<u64>) -> u64 {
        if !self.registry.is_active(order_ref) {
            return 0;
        }
        let slot = self.registry.slots[order_ref as usize];
        let Some(book) = self.books.get_mut(instr as usize) else {
            return 0;
        };

        let requested = quantity.unwrap_or(slot.remaining).min(slot.remaining);
        let removed = book.ladder_mut(slot.side).remove_quantity(slot.level, requested);

        let slot = &mut self.registry.slots[order_ref as usize];
        slot.remaining -= removed;
        if slot.remaining == 0 {
            slot.state = SlotState::Retired;
        }
        removed
    }

    /// Execution has no distinct book effect from partial cancellation.
    #[inline]
    pub fn execute_order(&mut self, instr: u32, order_ref: u32, quantity: u64) -> u64 {
        self.cancel_order(instr, order_ref, Some(quantity))
    }

    #[inline]
    pub fn delete_order(&mut self, instr: u32, order_ref: u32) -> u64 {
        self.cancel_order(instr, order_ref, None)
    }

    fn depth_view(book: &mut InstrumentBook) -> DepthView {
        let mut view = DepthView {
            ask_px: [book.ask.worst_price(); SNAPSHOT_DEPTH],
            ask_qty: [1; SNAPSHOT_DEPTH],
            bid_px: [book.bid.worst_price(); SNAPSHOT_DEPTH],
            bid_qty: [1; SNAPSHOT_DEPTH],
        };
        for (i, (px, qty)) in book.ask.top_k(SNAPSHOT_DEPTH).into_iter().enumerate() {
            view.ask_px[i] = px;
            view.ask_qty[i] = qty;
        }
        for (i, (px, qty)) in book.bid.top_k(SNAPSHOT_DEPTH).into_iter().enumerate() {
            view.bid_px[i] = px;
            view.bid_qty[i] = qty;
        }
        view
    }

    /// Full-universe snapshot: both sides of every instrument, extracted
    /// non-destructively by the book writer.
    pub fn snapshot(&mut self) -> BookSnapshot {
        BookSnapshot {
            books: self.books.iter_mut().map(Self::depth_view).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(levels: usize) -> Vec<InstrumentCfg> {
        vec![
            InstrumentCfg { symbol: "AMD_".into(), min_price: 1_000_000, tick: 2_500, levels },
            InstrumentCfg { symbol: "JPM_".into(), min_price: 1_000_000, tick: 2_500, levels },
        ]
    }

    fn engine() -> BookEngine {
        BookEngine::new(&cfg(256), 1024, 20)
    }

    #[test]
    fn add_then_best_on_both_sides() {
        let mut eng = engine();
        eng.add_order(0, 10, 1_010_000, 50, Side::Bid).unwrap();
        eng.add_order(0, 11, 1_020_000, 20, Side::Ask).unwrap();
        assert_eq!(eng.books[0].bid.best_level(), Some(4));
        assert_eq!(eng.books[0].ask.best_level(), Some(8));
        assert_eq!(eng.registry.remaining(10), 50);
    }

    #[test]
    fn order_conservation_across_partial_cancels() {
        let mut eng = engine();
        eng.add_order(0, 5, 1_005_000, 100, Side::Bid).unwrap();

        assert_eq!(eng.cancel_order(0, 5, Some(30)), 30);
        assert_eq!(eng.registry.remaining(5), 70);
        assert!(eng.registry.is_active(5));

        assert_eq!(eng.cancel_order(0, 5, Some(70)), 70);
        assert_eq!(eng.registry.remaining(5), 0);
        assert!(!eng.registry.is_active(5));
        assert_eq!(eng.books[0].bid.best_level(), None);
    }

    #[test]
    fn cancel_clamps_to_remaining() {
        let mut eng = engine();
        eng.add_order(1, 3, 1_002_500, 40, Side::Ask).unwrap();
        assert_eq!(eng.cancel_order(1, 3, Some(100)), 40);
        assert!(!eng.registry.is_active(3));
        // follow-up cancel on the now-retired id is a no-op
        assert_eq!(eng.cancel_order(1, 3, Some(1)), 0);
    }

    #[test]
    fn delete_removes_everything() {
        let mut eng = engine();
        eng.add_order(0, 8, 1_010_000, 25, Side::Ask).unwrap();
        assert_eq!(eng.delete_order(0, 8), 25);
        assert_eq!(eng.books[0].ask.best_level(), None);
    }

    #[test]
    fn execute_matches_partial_cancel_semantics() {
        let mut eng = engine();
        eng.add_order(0, 9, 1_010_000, 25, Side::Bid).unwrap();
        assert_eq!(eng.execute_order(0, 9, 10), 10);
        assert_eq!(eng.registry.remaining(9), 15);
        assert_eq!(eng.books[0].bid.quantity_at(4), 15);
    }

    #[test]
    fn rejects_are_reported_and_harmless() {
        let mut eng = engine();
        assert_eq!(
            eng.add_order(0, 5_000, 1_000_000, 1, Side::Bid),
            Err(AddReject::Capacity)
        );
        assert_eq!(
            eng.add_order(7, 1, 1_000_000, 1, Side::Bid),
            Err(AddReject::UnknownInstrument)
        );
        // cancel of an id that never existed
        assert_eq!(eng.cancel_order(0, 42, Some(5)), 0);
    }

    #[test]
    fn retired_ref_is_not_re_added() {
        let mut eng = engine();
        eng.add_order(0, 2, 1_000_000, 10, Side::Bid).unwrap();
        eng.delete_order(0, 2);
        assert_eq!(
            eng.add_order(0, 2, 1_000_000, 10, Side::Bid),
            Err(AddReject::RetiredRef)
        );
        assert_eq!(eng.books[0].bid.best_level(), None);
    }

    #[test]
    fn snapshot_due_fires_on_add_threshold() {
        let mut eng = BookEngine::new(&cfg(256), 1024, 3);
        let add = |i: u32| Event::Add {
            instr: 0,
            order_ref: i,
            side: Side::Bid,
            qty: 1,
            px: 1_000_000 + i * 2_500,
        };
        assert!(!eng.apply(&add(0)).snapshot_due);
        assert!(!eng.apply(&add(1)).snapshot_due);
        assert!(eng.apply(&add(2)).snapshot_due);
        // counter resets
        assert!(!eng.apply(&add(3)).snapshot_due);
    }

    #[test]
    fn rejected_add_still_counts_toward_threshold() {
        let mut eng = BookEngine::new(&cfg(256), 8, 1);
        let applied = eng.apply(&Event::Add {
            instr: 0,
            order_ref: 100, // beyond capacity 8
            side: Side::Bid,
            qty: 1,
            px: 1_000_000,
        });
        assert_eq!(applied.add_rejected, Some(AddReject::Capacity));
        // publication cadence follows the event stream, not acceptance
        assert!(applied.snapshot_due);
    }

    #[test]
    fn snapshot_pads_with_worst_price_and_unit_qty() {
        let mut eng = engine();
        eng.add_order(0, 1, 1_010_000, 50, Side::Bid).unwrap();
        eng.add_order(0, 2, 1_007_500, 30, Side::Bid).unwrap();
        eng.add_order(0, 3, 1_020_000, 10, Side::Ask).unwrap();

        let snap = eng.snapshot();
        let v = &snap.books[0];

        assert_eq!(v.bid_px[0], 1_010_000);
        assert_eq!(v.bid_qty[0], 50);
        assert_eq!(v.bid_px[1], 1_007_500);
        assert_eq!(v.bid_qty[1], 30);
        // bid padding: worst = min price, qty 1
        assert_eq!(v.bid_px[2], 1_000_000);
        assert_eq!(v.bid_qty[2], 1);

        assert_eq!(v.ask_px[0], 1_020_000);
        assert_eq!(v.ask_qty[0], 10);
        // ask padding: worst = max price, qty 1
        assert_eq!(v.ask_px[1], 1_000_000 + 255 * 2_500);
        assert_eq!(v.ask_qty[1], 1);

        // instrument 1 is empty: fully padded
        let w = &snap.books[1];
        assert!(w.bid_px.iter().all(|&p| p == 1_000_000));
        assert!(w.bid_qty.iter().all(|&q| q == 1));
    }

    #[test]
    fn snapshot_is_non_destructive() {
        let mut eng = engine();
        eng.add_order(0, 1, 1_012_500, 5, Side::Ask).unwrap();
        eng.add_order(0, 2, 1_015_000, 7, Side::Ask).unwrap();
        let first = eng.snapshot();
        let second = eng.snapshot();
        assert_eq!(first, second);
        assert_eq!(eng.books[0].ask.best_level(), Some(5));
    }
}
