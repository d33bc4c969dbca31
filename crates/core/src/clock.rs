// crates/core/src/clock.rs
//! Clock skew estimation against the remote peer
//!
//! Every client derives "now" from its own wall clock corrected by the skew
//! observed in the `Date` header of remote responses. Elapsed time between
//! observations comes from a monotonic source, so adjusting the local wall
//! clock between observations has no effect on the corrected instant.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of wall-clock and monotonic readings
pub trait TimeSource: Send + Sync + fmt::Debug {
    /// Current local wall-clock reading
    fn wall(&self) -> DateTime<Utc>;

    /// Monotonic reading, measured from an arbitrary fixed origin
    fn monotonic(&self) -> Duration;
}

/// Time source backed by the system clock and the runtime's monotonic clock
///
/// The monotonic side uses `tokio::time::Instant`, so paused test runtimes
/// advance it together with their timers.
#[derive(Debug)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    /// Creates a system clock anchored at the current instant
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven time source for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(DateTime<Utc>, Duration)>,
}

impl ManualClock {
    /// Creates a manual clock reading `wall`
    pub fn new(wall: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new((wall, Duration::ZERO)),
        }
    }

    /// Moves both the wall clock and the monotonic clock forward
    pub fn advance(&self, by: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.0 += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
            state.1 += by;
        }
    }

    /// Sets the wall clock only, as a user or NTP adjustment would
    pub fn set_wall(&self, wall: DateTime<Utc>) {
        if let Ok(mut state) = self.state.lock() {
            state.0 = wall;
        }
    }
}

impl TimeSource for ManualClock {
    fn wall(&self) -> DateTime<Utc> {
        self.state.lock().map(|s| s.0).unwrap_or_else(|_| Utc::now())
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().map(|s| s.1).unwrap_or(Duration::ZERO)
    }
}

/// Skew estimator tuning
#[derive(Debug, Clone)]
pub struct SkewConfig {
    /// Largest absolute skew accepted from a single sample
    pub max_abs_skew: Duration,
    /// Weight of a new sample in the running average
    pub alpha: f64,
}

impl SkewConfig {
    /// Creates a new configuration
    pub fn new(max_abs_skew: Duration, alpha: f64) -> Self {
        Self {
            max_abs_skew,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60), 0.2)
    }
}

#[derive(Debug)]
struct SkewState {
    skew_ms: i64,
    base_monotonic: Duration,
    base_wall: DateTime<Utc>,
    high_water: DateTime<Utc>,
    samples: u64,
}

/// Corrected "current instant" shared by every component of a client
#[derive(Debug)]
pub struct ClockSkewEstimator {
    source: Arc<dyn TimeSource>,
    config: SkewConfig,
    state: Mutex<SkewState>,
}

impl ClockSkewEstimator {
    /// Creates an estimator over `source` with zero initial skew
    pub fn new(source: Arc<dyn TimeSource>, config: SkewConfig) -> Self {
        let base_wall = source.wall();
        let base_monotonic = source.monotonic();
        Self {
            source,
            config,
            state: Mutex::new(SkewState {
                skew_ms: 0,
                base_monotonic,
                base_wall,
                high_water: base_wall,
                samples: 0,
            }),
        }
    }

    /// Creates an estimator over the system clock with default tuning
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()), SkewConfig::default())
    }

    /// Folds the `Date` header of a remote response into the running skew
    ///
    /// Returns false when the header is missing or unparseable; the previous
    /// skew is kept in that case.
    pub fn observe(&self, date_header: Option<&str>) -> bool {
        let Some(header) = date_header.map(str::trim).filter(|h| !h.is_empty()) else {
            log::debug!("No Date header, keeping skew");
            return false;
        };

        let server = match parse_http_date(header) {
            Some(server) => server,
            None => {
                log::debug!("Unparseable Date header '{}', keeping skew", header);
                return false;
            }
        };

        let wall = self.source.wall();
        let monotonic = self.source.monotonic();
        let Ok(mut state) = self.state.lock() else {
            return false;
        };

        // a wall clock set backward keeps the monotonic anchor
        let anchored = state.base_wall + elapsed_since(state.base_monotonic, monotonic);
        let local = if wall < anchored {
            log::debug!(
                "Local wall clock behind anchor by {}ms",
                (anchored - wall).num_milliseconds()
            );
            anchored
        } else {
            wall
        };

        let raw_ms = (server - local).num_milliseconds();
        let limit_ms = i64::try_from(self.config.max_abs_skew.as_millis()).unwrap_or(i64::MAX);
        let clamped_ms = raw_ms.clamp(-limit_ms, limit_ms);
        if clamped_ms != raw_ms {
            log::warn!("Excessive clock skew {}ms clamped to {}ms", raw_ms, clamped_ms);
        }

        let alpha = self.config.alpha;
        let smoothed = (alpha * clamped_ms as f64 + (1.0 - alpha) * state.skew_ms as f64) as i64;

        state.skew_ms = smoothed;
        state.base_monotonic = monotonic;
        state.base_wall = local;
        state.samples += 1;

        log::debug!(
            "Clock sync: raw={}ms clamped={}ms smoothed={}ms",
            raw_ms,
            clamped_ms,
            smoothed
        );
        true
    }

    /// Current instant corrected by the estimated skew, never decreasing
    pub fn now(&self) -> DateTime<Utc> {
        let monotonic = self.source.monotonic();
        let Ok(mut state) = self.state.lock() else {
            return self.source.wall();
        };

        let computed = state.base_wall
            + elapsed_since(state.base_monotonic, monotonic)
            + chrono::Duration::milliseconds(state.skew_ms);

        if computed > state.high_water {
            state.high_water = computed;
        }
        state.high_water
    }

    /// Current smoothed skew (server minus local)
    pub fn skew(&self) -> chrono::Duration {
        let skew_ms = self.state.lock().map(|s| s.skew_ms).unwrap_or(0);
        chrono::Duration::milliseconds(skew_ms)
    }

    /// Returns true once at least one `Date` header has been folded in
    pub fn is_synchronized(&self) -> bool {
        self.state.lock().map(|s| s.samples > 0).unwrap_or(false)
    }

    /// Compact one-line description for debug output
    pub fn compact_debug(&self) -> String {
        format!(
            "skew={}ms,sync={}",
            self.skew().num_milliseconds(),
            if self.is_synchronized() { "yes" } else { "no" }
        )
    }
}

fn elapsed_since(base: Duration, monotonic: Duration) -> chrono::Duration {
    chrono::Duration::from_std(monotonic.saturating_sub(base))
        .unwrap_or_else(|_| chrono::Duration::zero())
}

/// Parses an HTTP date (RFC 1123), accepting RFC 3339 as a fallback
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}
