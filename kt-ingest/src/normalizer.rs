use std::collections::HashMap;

use kt_contracts::{Pass, RawDetection, RejectReason, Source};

/// Default minimum number of digits a tag must carry to be accepted.
pub const DEFAULT_MIN_TAG_LEN: usize = 7;
/// Default per-tag de-duplication window, in milliseconds.
pub const DEFAULT_DEDUP_WINDOW_MS: i64 = 3_000;

/// Per-source counters the operator surfaces for observability; not
/// consulted by any correctness path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizerCounters {
    pub accepted: u64,
    pub dedup_suppressed: u64,
    pub too_few_digits: u64,
    pub rate_limited: u64,
}

/// Turns raw decoder output into typed `Pass` events. Never retries: a raw
/// detection either becomes exactly one `Pass` or is dropped with a reason.
pub struct Normalizer {
    min_tag_len: usize,
    dedup_window_ms: i64,
    max_per_sec: Option<u32>,
    last_accepted_ms: HashMap<String, i64>,
    current_sec: i64,
    count_this_sec: u32,
    pub counters: NormalizerCounters,
}

impl Normalizer {
    pub fn new(min_tag_len: usize, dedup_window_ms: i64, max_per_sec: Option<u32>) -> Self {
        Normalizer {
            min_tag_len,
            dedup_window_ms,
            max_per_sec,
            last_accepted_ms: HashMap::new(),
            current_sec: 0,
            count_this_sec: 0,
            counters: NormalizerCounters::default(),
        }
    }

    /// Strip non-digit characters, validate length, apply the per-tag
    /// dedup window and the optional global rate limit.
    pub fn normalize(&mut self, raw: &RawDetection) -> Result<Pass, RejectReason> {
        let digits: String = raw.tag_raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < self.min_tag_len {
            self.counters.too_few_digits += 1;
            return Err(RejectReason::TooFewDigits);
        }

        if let Some(&prev_ms) = self.last_accepted_ms.get(&digits) {
            if raw.ts_recv_ms - prev_ms < self.dedup_window_ms {
                self.counters.dedup_suppressed += 1;
                return Err(RejectReason::DedupSuppressed);
            }
        }

        if let Some(max) = self.max_per_sec {
            let sec = raw.ts_recv_ms / 1000;
            if sec != self.current_sec {
                self.current_sec = sec;
                self.count_this_sec = 0;
            }
            if self.count_this_sec >= max {
                self.counters.rate_limited += 1;
                return Err(RejectReason::RateLimited);
            }
            self.count_this_sec += 1;
        }

        self.last_accepted_ms.insert(digits.clone(), raw.ts_recv_ms);
        self.counters.accepted += 1;

        Ok(Pass {
            tag: digits,
            ts_recv_ms: raw.ts_recv_ms,
            source: Source::Track,
            device_id: raw.device_id.clone(),
            device_secs: raw.device_secs,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(DEFAULT_MIN_TAG_LEN, DEFAULT_DEDUP_WINDOW_MS, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ts_recv_ms: i64, tag: &str) -> RawDetection {
        RawDetection { ts_recv_ms, tag_raw: tag.to_string(), device_id: None, device_secs: None }
    }

    #[test]
    fn strips_non_digits_and_accepts_long_enough_tags() {
        let mut n = Normalizer::default();
        let pass = n.normalize(&raw(0, "TAG-1234567")).unwrap();
        assert_eq!(pass.tag, "1234567");
    }

    #[test]
    fn rejects_short_tags() {
        let mut n = Normalizer::default();
        assert_eq!(n.normalize(&raw(0, "123")), Err(RejectReason::TooFewDigits));
    }

    #[test]
    fn dedup_window_suppresses_repeat_within_window() {
        let mut n = Normalizer::default();
        n.normalize(&raw(0, "1234567")).unwrap();
        assert_eq!(n.normalize(&raw(2_999, "1234567")), Err(RejectReason::DedupSuppressed));
        assert!(n.normalize(&raw(3_000, "1234567")).is_ok());
    }

    #[test]
    fn rate_limit_rejects_once_saturated() {
        let mut n = Normalizer::new(DEFAULT_MIN_TAG_LEN, 0, Some(2));
        assert!(n.normalize(&raw(0, "1111111")).is_ok());
        assert!(n.normalize(&raw(0, "2222222")).is_ok());
        assert_eq!(n.normalize(&raw(0, "3333333")), Err(RejectReason::RateLimited));
        assert!(n.normalize(&raw(1_000, "3333333")).is_ok());
    }
}
