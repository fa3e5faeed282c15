use chrono::{Duration, Local, NaiveDate};

use crate::models::TimeBucket;

/// Default cap on bucket count for very long windows
pub const DEFAULT_MAX_BUCKETS: usize = 9;

/// Granularity tiers: (largest window in days, nominal bucket width in days)
const GRANULARITY_TIERS: &[(u32, usize)] = &[(7, 1), (31, 7), (92, 14), (186, 30)];

/// Nominal bucket width once every tier is exceeded
const LONG_WINDOW_WIDTH: usize = 45;

/// Partitions a trailing window into ordered calendar buckets
///
/// The window `[today - window_days, today]` is inclusive on both ends, so it
/// spans `window_days + 1` calendar dates. Bucket 0 is the oldest; the last
/// bucket always ends on `today`. When the days do not divide evenly the
/// oldest buckets are one day wider. A window reaching past the earliest
/// representable date is shortened to start there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucketer {
    max_buckets: usize,
}

impl Default for TimeBucketer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeBucketer {
    pub fn new() -> Self {
        TimeBucketer {
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    pub fn with_max_buckets(max_buckets: usize) -> Self {
        TimeBucketer {
            max_buckets: max_buckets.max(1),
        }
    }

    /// Today's date in the local calendar
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Buckets for a window ending today (local calendar)
    pub fn buckets(&self, window_days: u32) -> Vec<TimeBucket> {
        self.buckets_ending(Self::today(), window_days)
    }

    /// Buckets for a window ending on `today`
    pub fn buckets_ending(&self, today: NaiveDate, window_days: u32) -> Vec<TimeBucket> {
        let window_days = clamp_window(today, window_days);
        let total_days = window_days as usize + 1;
        let count = self.bucket_count(window_days);
        let base = total_days / count;
        let extra = total_days % count;

        let (mut cursor, _) = window_bounds(today, window_days);
        let mut buckets = Vec::with_capacity(count);

        for index in 0..count {
            let width = base + usize::from(index < extra);
            let end = cursor
                .checked_add_signed(Duration::days(width as i64 - 1))
                .unwrap_or(today)
                .min(today);
            buckets.push(TimeBucket {
                index,
                start: cursor,
                end,
            });
            cursor = end.succ_opt().unwrap_or(end);
        }

        buckets
    }

    /// Number of buckets a window is split into
    pub fn bucket_count(&self, window_days: u32) -> usize {
        let total_days = window_days as usize + 1;
        let width = GRANULARITY_TIERS
            .iter()
            .find(|(max_window, _)| window_days <= *max_window)
            .map(|(_, width)| *width)
            .unwrap_or(LONG_WINDOW_WIDTH);

        total_days
            .div_ceil(width)
            .min(self.max_buckets)
            .min(total_days)
            .max(1)
    }
}

/// Inclusive first and last date of a trailing window
pub fn window_bounds(today: NaiveDate, window_days: u32) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

/// Longest window that still starts on a representable date
fn clamp_window(today: NaiveDate, window_days: u32) -> u32 {
    let available = today.signed_duration_since(NaiveDate::MIN).num_days();
    u32::try_from(available).map_or(window_days, |available| window_days.min(available))
}
