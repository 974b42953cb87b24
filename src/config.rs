// src/config.rs
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: General,
    pub book: Book,
    pub pipeline: Pipeline,
    pub feed: Feed,
    pub venue: Venue,
    pub instruments: Vec<InstrumentCfg>,
    pub cpu: Cpu,
    pub metrics: Option<Metrics>,
    pub fills: Option<FillsCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub event_queue_capacity: usize, // e.g., 65536
    pub spin_loops_per_yield: u32,   // e.g., 64
}

#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    pub registry_capacity: usize, // order-ref slots, e.g., 1024
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: u32, // snapshot after this many adds
}

fn default_publish_threshold() -> u32 { 20 }

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    /// Weighting for the sizing/covariance price vector.
    #[serde(default = "default_sizing_weighting")]
    pub sizing_weighting: WeightingCfg,
    /// Weighting for the transmitted (wire) price vector.
    #[serde(default = "default_wire_weighting")]
    pub wire_weighting: WeightingCfg,
    pub snapshot_queue_capacity: usize, // e.g., 64
}

fn default_initial_cash() -> f64 { 10_000.0 }
fn default_sizing_weighting() -> WeightingCfg { WeightingCfg::Raw }
fn default_wire_weighting() -> WeightingCfg { WeightingCfg::Scaled }

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingCfg {
    Raw,
    Scaled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    /// Market-data source, e.g. "127.0.0.1:12345"
    pub endpoint: String,
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Venue {
    /// Execution venue for outbound batches, e.g. "127.0.0.1:12346"
    pub endpoint: String,
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
    pub batch_queue_capacity: usize, // e.g., 64
}

fn default_reconnect_ms() -> u64 { 1000 }

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentCfg {
    /// Up to 8 chars; space-padded on the wire.
    pub symbol: String,
    pub min_price: u32, // fixed-point x10000
    pub tick: u32,      // fixed-point x10000
    pub levels: usize,  // price levels, e.g., 256
}

impl InstrumentCfg {
    pub fn padded_symbol(&self) -> [u8; 8] {
        let mut out = [b' '; 8];
        for (dst, src) in out.iter_mut().zip(self.symbol.bytes()) {
            *dst = src;
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cpu {
    #[serde(default)]
    pub rx_core: Option<usize>,
    #[serde(default)]
    pub book_core: Option<usize>,
    #[serde(default)]
    pub decide_core: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metrics {
    /// Bind address for Prometheus exporter (e.g. "0.0.0.0:9100")
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillsCfg {
    /// Append-only CSV of emitted orders (e.g. "ouch_events.csv")
    pub path: String,
}

impl AppConfig {
    pub fn from_file(p: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instruments.is_empty() {
            anyhow::bail!("at least one [[instruments]] entry is required");
        }
        for inst in &self.instruments {
            if inst.symbol.is_empty() || inst.symbol.len() > 8 {
                anyhow::bail!("instrument symbol {:?} must be 1..=8 chars", inst.symbol);
            }
            if inst.tick == 0 {
                anyhow::bail!("instrument {:?}: tick must be > 0", inst.symbol);
            }
            if inst.levels == 0 {
                anyhow::bail!("instrument {:?}: levels must be > 0", inst.symbol);
            }
        }
        if self.book.registry_capacity == 0 {
            anyhow::bail!("book.registry_capacity must be > 0");
        }
        if self.book.publish_threshold == 0 {
            anyhow::bail!("book.publish_threshold must be > 0");
        }
        if self.general.event_queue_capacity == 0 {
            anyhow::bail!("general.event_queue_capacity must be > 0");
        }
        if self.pipeline.snapshot_queue_capacity == 0 || self.venue.batch_queue_capacity == 0 {
            anyhow::bail!("queue capacities must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [general]
        event_queue_capacity = 65536
        spin_loops_per_yield = 64

        [book]
        registry_capacity = 1024
        publish_threshold = 20

        [pipeline]
        snapshot_queue_capacity = 64

        [feed]
        endpoint = "127.0.0.1:12345"

        [venue]
        endpoint = "127.0.0.1:12346"
        batch_queue_capacity = 64

        [cpu]

        [[instruments]]
        symbol = "AMD_"
        min_price = 1000000
        tick = 2500
        levels = 256

        [[instruments]]
        symbol = "JPM_"
        min_price = 1000000
        tick = 2500
        levels = 256
    "#;

    #[test]
    fn parses_and_validates_sample() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.instruments.len(), 2);
        assert_eq!(cfg.book.publish_threshold, 20);
        assert_eq!(cfg.pipeline.initial_cash, 10_000.0);
    }

    #[test]
    fn symbols_are_space_padded() {
        let inst = InstrumentCfg {
            symbol: "PG".into(),
            min_price: 1_000_000,
            tick: 2_500,
            levels: 256,
        };
        assert_eq!(inst.padded_symbol(), *b"PG      ");
    }

    #[test]
    fn rejects_oversized_symbol() {
        let cfg: AppConfig = toml::from_str(
            &SAMPLE.replace("symbol = \"AMD_\"", "symbol = \"TOOLONGSYM\""),
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }
}
