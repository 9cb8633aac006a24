// agora_core/src/output.rs
//
// Output sinks (C12): the human-readable market row and the dense
// snapshot matrix. Grounded on `original_source/src/sim.h`'s
// `CerrLogger` pretty-print for the row layout (depth-many bid/ask
// tuples bracketing a weighted-mid column) and on spec §6/§8 for the
// snapshot matrix's `T x (1 + 6L + 5)` shape, where the five trailing
// columns are forward-looking statistics of `wm` over the next
// one-second window. Uses the `csv` crate to write the matrix, the same
// tokenizer `replay.rs` uses to read one.

use crate::agent::MarketSnapshot;
use crate::error::{SimError, SimResult};
use crate::notifier::LevelView;
use crate::types::{Price, Size, Time};

/// Format one market row: `time[s] [bid(size@price(age))]*depth wm:x.xx
/// [ask(size@price(age))]*depth`, best level first on each side. A
/// missing level at some depth prints as `0@0(0.000)`.
pub fn format_market_row(market: &MarketSnapshot, depth: usize) -> String {
    let mut parts = Vec::with_capacity(2 + 2 * depth);
    parts.push(format!("{:.9}", market.time as f64 * 1e-9));
    for i in 0..depth {
        parts.push(format_level(market.bids.get(i), 'b'));
    }
    parts.push(format!("wm:{:.2}", market.weighted_mid));
    for i in 0..depth {
        parts.push(format_level(market.asks.get(i), 'a'));
    }
    parts.join(" ")
}

fn format_level(level: Option<&LevelView>, tag: char) -> String {
    match level {
        Some(l) => format!("{}{tag}@{}({:.3})", l.total_shown, l.price, l.average_age.unwrap_or(0.0)),
        None => format!("0{tag}@0(0.000)"),
    }
}

#[derive(Debug, Clone)]
struct Tick {
    time: Time,
    wm: f64,
    bid_prices: Vec<Price>,
    ask_prices: Vec<Price>,
    bid_sizes: Vec<Size>,
    ask_sizes: Vec<Size>,
    bid_ages: Vec<f64>,
    ask_ages: Vec<f64>,
}

/// Window over which the snapshot matrix's trailing columns measure
/// forward `wm` movement, per spec §6.
const FORWARD_WINDOW_NS: Time = 1_000_000_000;

/// Accumulates market ticks during a run and, on `finalize`, produces a
/// dense `T x (1 + 6*depth + 5)` matrix: time, then per level
/// `(bid_price, ask_price, bid_size, ask_size, bid_age, ask_age)`, then
/// five forward-looking statistics of `wm` over the next
/// `FORWARD_WINDOW_NS`: terminal signed delta, max delta, min delta, a
/// time-weighted mean delta, and the time-weighted standard deviation of
/// delta. Rows with no future sample inside the window report `NaN` for
/// all five trailing columns.
pub struct SnapshotMatrixBuilder {
    depth: usize,
    ticks: Vec<Tick>,
}

impl SnapshotMatrixBuilder {
    pub fn new(depth: usize) -> Self {
        Self { depth, ticks: Vec::new() }
    }

    pub fn push(&mut self, market: &MarketSnapshot) {
        let prices = |levels: &[LevelView]| -> Vec<Price> { (0..self.depth).map(|i| levels.get(i).map(|l| l.price).unwrap_or(0)).collect() };
        let sizes = |levels: &[LevelView]| -> Vec<Size> { (0..self.depth).map(|i| levels.get(i).map(|l| l.total_shown).unwrap_or(0)).collect() };
        let ages = |levels: &[LevelView]| -> Vec<f64> { (0..self.depth).map(|i| levels.get(i).and_then(|l| l.average_age).unwrap_or(0.0)).collect() };
        self.ticks.push(Tick {
            time: market.time,
            wm: market.weighted_mid,
            bid_prices: prices(&market.bids),
            ask_prices: prices(&market.asks),
            bid_sizes: sizes(&market.bids),
            ask_sizes: sizes(&market.asks),
            bid_ages: ages(&market.bids),
            ask_ages: ages(&market.asks),
        });
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn finalize(&self) -> Vec<Vec<f64>> {
        let mut out = Vec::with_capacity(self.ticks.len());
        for (i, row) in self.ticks.iter().enumerate() {
            let mut cols = Vec::with_capacity(1 + 6 * self.depth + 5);
            cols.push(row.time as f64 * 1e-9);
            for l in 0..self.depth {
                cols.push(row.bid_prices[l] as f64);
                cols.push(row.ask_prices[l] as f64);
                cols.push(row.bid_sizes[l] as f64);
                cols.push(row.ask_sizes[l] as f64);
                cols.push(row.bid_ages[l]);
                cols.push(row.ask_ages[l]);
            }
            cols.extend(self.forward_stats(i, row));
            out.push(cols);
        }
        out
    }

    fn forward_stats(&self, i: usize, row: &Tick) -> [f64; 5] {
        if row.wm.is_nan() {
            return [f64::NAN; 5];
        }
        let window_end = row.time + FORWARD_WINDOW_NS;
        let mut deltas = Vec::new();
        let mut weights = Vec::new();
        let mut prev_time = row.time;
        for future in self.ticks[i + 1..].iter().take_while(|r| r.time <= window_end) {
            if future.wm.is_nan() {
                prev_time = future.time;
                continue;
            }
            deltas.push(future.wm - row.wm);
            weights.push((future.time - prev_time) as f64);
            prev_time = future.time;
        }
        if deltas.is_empty() {
            return [f64::NAN; 5];
        }
        let terminal = *deltas.last().unwrap();
        let dmax = deltas.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let dmin = deltas.iter().cloned().fold(f64::INFINITY, f64::min);
        let wsum: f64 = weights.iter().sum();
        let wmean = if wsum > 0.0 {
            deltas.iter().zip(&weights).map(|(d, w)| d * w).sum::<f64>() / wsum
        } else {
            deltas.iter().sum::<f64>() / deltas.len() as f64
        };
        let wvar = if wsum > 0.0 {
            deltas.iter().zip(&weights).map(|(d, w)| w * (d - wmean).powi(2)).sum::<f64>() / wsum
        } else {
            deltas.iter().map(|d| (d - wmean).powi(2)).sum::<f64>() / deltas.len() as f64
        };
        [terminal, dmax, dmin, wmean, wvar.sqrt()]
    }
}

/// Write a finalized matrix as comma-separated rows.
pub fn write_snapshot_matrix<W: std::io::Write>(matrix: &[Vec<f64>], writer: W) -> SimResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for row in matrix {
        let strs: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        wtr.write_record(&strs).map_err(|e| SimError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    }
    wtr.flush()?;
    Ok(())
}
