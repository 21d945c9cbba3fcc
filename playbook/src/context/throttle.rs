//! Rate limiting for outbound calls, backed by `governor`.

use crate::core::value::as_usize;
use crate::errors::ActionError;
use serde_json::Value;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Default burst allowance.
pub const DEFAULT_BURST: u32 = 3;

/// A rate limit applied to one call site.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSpec {
    /// Sustained requests per second.
    pub rps: f64,
    /// Requests allowed back to back before throttling starts.
    pub burst: u32,
    /// Limiter name; calls sharing a key share a limiter.
    pub key: String,
}

impl ThrottleSpec {
    /// Creates a spec. A burst of zero is raised to one.
    #[must_use]
    pub fn new(rps: f64, burst: u32, key: impl Into<String>) -> Self {
        Self {
            rps,
            burst: burst.max(1),
            key: key.into(),
        }
    }

    /// Reads a `throttle: {rps, burst?, key?}` parameter.
    ///
    /// Missing fields fall back to `default_rps`, [`DEFAULT_BURST`] and
    /// `default_key`. Returns `Ok(None)` when no rate is available at all.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the parameter is not an object or the
    /// rate is not a positive number.
    pub fn from_param(
        action: &str,
        value: &Value,
        default_key: &str,
        default_rps: Option<f64>,
    ) -> Result<Option<Self>, ActionError> {
        let Value::Object(fields) = value else {
            return Err(ActionError::invalid(action, "throttle", "expected an object"));
        };

        let rps = match fields.get("rps") {
            None | Some(Value::Null) => default_rps,
            Some(v) => Some(number(v).ok_or_else(|| {
                ActionError::invalid(action, "throttle.rps", format!("not a number: {v}"))
            })?),
        };
        let Some(rps) = rps else {
            return Ok(None);
        };
        if !(rps > 0.0 && rps.is_finite()) {
            return Err(ActionError::invalid(
                action,
                "throttle.rps",
                "must be greater than zero",
            ));
        }

        let burst = fields
            .get("burst")
            .and_then(as_usize)
            .map_or(DEFAULT_BURST, |b| u32::try_from(b).unwrap_or(u32::MAX));
        let key = fields
            .get("key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .unwrap_or(default_key);

        Ok(Some(Self::new(rps, burst, key)))
    }

    /// The `governor` quota for this spec: one cell every `1 / rps` seconds
    /// with `burst` cells available up front.
    #[must_use]
    pub fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(Duration::from_secs_f64(1.0 / self.rps))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst)
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

struct Limiter {
    quota: Quota,
    limiter: DefaultDirectRateLimiter,
}

/// Rate limiters for a run, one per [`ThrottleSpec::key`].
///
/// A key keeps its limiter while the spec's quota is unchanged; a call with
/// a different rate or burst for the same key starts a fresh limiter.
#[derive(Default)]
pub struct ThrottleRegistry {
    limiters: HashMap<String, Limiter>,
    clock: DefaultClock,
}

impl fmt::Debug for ThrottleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleRegistry")
            .field("keys", &self.limiters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ThrottleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the limiter for `spec` admits a call.
    /// Returns how long the caller was held back.
    pub async fn acquire(&mut self, spec: &ThrottleSpec) -> Duration {
        let quota = spec.quota();
        let entry = self
            .limiters
            .entry(spec.key.clone())
            .and_modify(|l| {
                if l.quota != quota {
                    debug!(key = %spec.key, "Throttle quota changed, resetting limiter");
                    *l = Limiter::new(quota);
                }
            })
            .or_insert_with(|| Limiter::new(quota));

        let mut waited = Duration::ZERO;
        while let Err(not_until) = entry.limiter.check() {
            let wait = not_until
                .wait_time_from(self.clock.now())
                .max(Duration::from_millis(1));
            debug!(key = %spec.key, wait_ms = millis(wait), "Throttling call");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
        waited
    }

    /// Number of limiters created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no limiter has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl Limiter {
    fn new(quota: Quota) -> Self {
        Self {
            quota,
            limiter: RateLimiter::direct(quota),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
