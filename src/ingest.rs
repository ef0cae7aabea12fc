use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::db::{InsertOutcome, TradeStore};
use crate::error::{IngestError, Result};
use crate::pages::TradeSource;
use crate::parser::parse_description;
use crate::tracker::ProgressStore;

pub const DEFAULT_START_ID: i64 = 20003780000;
pub const MAX_TO_CHECK: u32 = 50;
pub const REQUEST_DELAY: Duration = Duration::from_millis(500);

/// Knobs for one pass over the id window.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub default_start_id: i64,
    pub max_to_check: u32,
    pub delay: Duration,
    pub show_progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_start_id: DEFAULT_START_ID,
            max_to_check: MAX_TO_CHECK,
            delay: REQUEST_DELAY,
            show_progress: true,
        }
    }
}

/// Stats returned after a pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub start_id: i64,
    pub attempted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub last_id: Option<i64>,
}

/// Fetch, parse and insert a single trade. Every failure is logged and
/// reported as `None`; callers only learn whether the id made it in.
pub async fn insert_one_row(
    source: &impl TradeSource,
    store: &mut TradeStore,
    trade_id: i64,
) -> Option<InsertOutcome> {
    match try_insert(source, store, trade_id).await {
        Ok(outcome) => {
            match outcome {
                InsertOutcome::Inserted => info!("Trade ID {} inserted.", trade_id),
                InsertOutcome::Duplicate => info!("Trade ID {} already stored.", trade_id),
            }
            Some(outcome)
        }
        Err(e) => {
            warn!("Trade ID {} failed: {}", trade_id, e);
            None
        }
    }
}

async fn try_insert(
    source: &impl TradeSource,
    store: &mut TradeStore,
    trade_id: i64,
) -> Result<InsertOutcome> {
    let description = source.fetch_description(trade_id).await?;
    let record =
        parse_description(&description).ok_or_else(|| IngestError::NoMatch(description.clone()))?;
    store.insert_ignore(&record).await
}

/// One forward pass over `[start + 1, start + max_to_check]`.
///
/// The tracker entry for `today` is saved after every successful insert, before
/// the next id is tried. Tracker and commit failures abort the pass.
pub async fn run_pass(
    source: &impl TradeSource,
    store: &mut TradeStore,
    progress: &mut impl ProgressStore,
    today: &str,
    config: &RunConfig,
) -> Result<RunStats> {
    let mut tracker = progress.load()?;
    let start_id = tracker.start_id(today, config.default_start_id);
    let (first_id, end_id) = start_id
        .checked_add(1)
        .zip(start_id.checked_add(i64::from(config.max_to_check)))
        .ok_or(IngestError::WindowOverflow {
            start_id,
            max_to_check: config.max_to_check,
        })?;
    info!("Checking trade IDs {}..={} for {}", first_id, end_id, today);

    let pb = if config.show_progress {
        let pb = ProgressBar::new(u64::from(config.max_to_check));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut stats = RunStats {
        start_id,
        ..Default::default()
    };

    for trade_id in first_id..=end_id {
        pb.set_message(trade_id.to_string());
        stats.attempted += 1;

        match insert_one_row(source, store, trade_id).await {
            Some(outcome) => {
                match outcome {
                    InsertOutcome::Inserted => stats.inserted += 1,
                    InsertOutcome::Duplicate => stats.duplicates += 1,
                }
                stats.last_id = Some(trade_id);
                tracker.record(today, trade_id);
                progress.save(&tracker)?;
            }
            None => stats.skipped += 1,
        }

        tokio::time::sleep(config.delay).await;
        store.commit().await?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Pass done: {} attempted, {} inserted, {} duplicates, {} skipped",
        stats.attempted, stats.inserted, stats.duplicates, stats.skipped
    );
    Ok(stats)
}
