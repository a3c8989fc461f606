//! Token-budget truncation for captured request bodies.
//!
//! The log is cut before prompt assembly so the classifier call never
//! exceeds the model context. When the vendor token counter is unavailable
//! the fallback is a character cap of three bytes per token, which
//! approximates typical HTTP payloads.

use tracing::{debug, warn};

use crate::client::AiClient;

const TRUNCATED_MARKER: &str = "...[TRUNCATED]";
const SAFE_MODE_MARKER: &str = "...[TRUNCATED_SAFE_MODE]";

/// Ratio safety margin absorbing tokenizer variance.
const SAFE_RATIO: f64 = 0.90;

/// Fit `log` into the model's token budget.
///
/// Fast path: logs shorter (in bytes) than `max_tokens` cannot exceed the
/// budget and pass through untouched. Otherwise the vendor counter decides;
/// if it fails, a `3 * max_tokens` character cap applies instead.
pub async fn truncate_log(client: &dyn AiClient, log: String, max_tokens: usize) -> String {
    if log.len() < max_tokens {
        return log;
    }

    let count = match client.count_tokens(&log).await {
        Ok(count) => count,
        Err(err) => {
            warn!(
                error = %err,
                log_length = log.len(),
                "token count failed, falling back to safe-mode character cap"
            );
            let safe_char_limit = max_tokens * 3;
            if log.len() > safe_char_limit {
                let cut = floor_char_boundary(&log, safe_char_limit);
                return format!("{}{}", &log[..cut], SAFE_MODE_MARKER);
            }
            return log;
        }
    };

    if count <= max_tokens {
        debug!(tokens = count, max_tokens, "log fits token budget");
        return log;
    }

    let ratio = max_tokens as f64 / count as f64;
    let safe_ratio = ratio * SAFE_RATIO;
    let mut new_len = (log.len() as f64 * safe_ratio) as usize;
    if new_len == 0 {
        new_len = 1;
    }
    let cut = floor_char_boundary(&log, new_len);

    debug!(
        original_tokens = count,
        max_tokens,
        original_length = log.len(),
        new_length = cut,
        "truncating log to fit token budget"
    );

    format!("{}{}", &log[..cut], TRUNCATED_MARKER)
}

/// Largest char boundary not exceeding `idx`, so byte cuts never split a
/// code point.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockAi;

    #[tokio::test]
    async fn short_log_passes_through() {
        let ai = MockAi::new().with_max_tokens(100);
        let log = "hello".to_string();
        assert_eq!(truncate_log(&ai, log.clone(), 100).await, log);
    }

    #[tokio::test]
    async fn within_token_budget_passes_through() {
        let ai = MockAi::new().counting(50);
        let log = "a".repeat(200);
        assert_eq!(truncate_log(&ai, log.clone(), 100).await, log);
    }

    #[tokio::test]
    async fn over_budget_truncates_with_marker() {
        // 10000 bytes, 10000 tokens reported, budget 5000:
        // new_len = floor(10000 * 0.9 * 0.5) = 4500.
        let ai = MockAi::new().counting(10_000);
        let log = "A".repeat(10_000);
        let out = truncate_log(&ai, log, 5_000).await;
        assert!(out.ends_with(TRUNCATED_MARKER));
        assert_eq!(out.len(), 4_500 + TRUNCATED_MARKER.len());
    }

    #[tokio::test]
    async fn count_failure_applies_safe_mode_cap() {
        let ai = MockAi::new().failing_count();
        let log = "x".repeat(400);
        let out = truncate_log(&ai, log, 100).await;
        assert!(out.ends_with(SAFE_MODE_MARKER));
        assert_eq!(out.len(), 300 + SAFE_MODE_MARKER.len());
    }

    #[tokio::test]
    async fn count_failure_within_cap_passes_through() {
        let ai = MockAi::new().failing_count();
        let log = "x".repeat(250);
        assert_eq!(truncate_log(&ai, log.clone(), 100).await, log);
    }

    #[tokio::test]
    async fn cut_never_splits_a_code_point() {
        // Multibyte content with a budget that lands mid-character.
        let ai = MockAi::new().counting(1_000);
        let log = "é".repeat(500); // 1000 bytes
        let out = truncate_log(&ai, log, 100).await;
        assert!(out.ends_with(TRUNCATED_MARKER));
        let kept = &out[..out.len() - TRUNCATED_MARKER.len()];
        assert!(kept.chars().all(|c| c == 'é'));
        // 0.9 * (100/1000) * 1000 = 90 bytes, floored to the 88-byte boundary.
        assert!(kept.len() <= 90);
    }
}
