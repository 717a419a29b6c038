use redis::{AsyncCommands, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

/// Outcome of one hit against a fixed-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// The key has no TTL yet, so this hit opens the window.
    pub start_window: bool,
}

/// `count` is the counter after this hit and `ttl` the key's remaining TTL as
/// reported by `TTL` (`-1` when none is set). The TTL is only ever set when
/// missing, so a window ends `window_seconds` after its first hit no matter
/// how often the key is hit afterwards.
pub fn window_decision(count: i64, ttl: i64, limit: i64) -> WindowDecision {
    WindowDecision {
        allowed: count <= limit,
        start_window: ttl < 0,
    }
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `false` once `limit` calls were seen for
    /// `key` within the current window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .ttl(key)
            .query_async(&mut conn)
            .await?;

        let decision = window_decision(count, ttl, limit);
        if decision.start_window {
            let _: () = conn.expire(key, window_seconds).await?;
        }

        Ok(decision.allowed)
    }
}

/// Rate-limit bucket for one client address.
pub fn ip_rate_key(ip: &str) -> String {
    format!("ratelimit:ip:{}", ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_key_is_namespaced() {
        assert_eq!(ip_rate_key("10.0.0.1"), "ratelimit:ip:10.0.0.1");
    }

    #[test]
    fn test_first_hit_opens_window() {
        assert_eq!(
            window_decision(1, -1, 3),
            WindowDecision { allowed: true, start_window: true }
        );
    }

    #[test]
    fn test_later_hits_keep_the_running_window() {
        for count in 2..=3 {
            let decision = window_decision(count, 42, 3);
            assert!(decision.allowed);
            assert!(!decision.start_window);
        }
        assert_eq!(
            window_decision(4, 1, 3),
            WindowDecision { allowed: false, start_window: false }
        );
    }

    #[test]
    fn test_counter_left_without_ttl_gets_one() {
        // An earlier EXPIRE that never ran must not leave the limit stuck.
        let decision = window_decision(500, -1, 3);
        assert!(!decision.allowed);
        assert!(decision.start_window);
    }

    #[test]
    fn test_sustained_traffic_is_admitted_again_after_window() {
        // Hits every second against a 5s window of 3 requests: the TTL set on
        // the first hit counts down, the key expires and the counter restarts.
        let (limit, window) = (3, 5);
        let mut count = 0;
        let mut ttl = -2;
        let mut admitted = Vec::new();
        for _ in 0..12 {
            if ttl == 0 {
                count = 0;
                ttl = -2;
            }
            count += 1;
            let decision = window_decision(count, if ttl == -2 { -1 } else { ttl }, limit);
            if decision.start_window {
                ttl = window;
            }
            admitted.push(decision.allowed);
            ttl -= 1;
        }
        assert_eq!(
            admitted,
            vec![true, true, true, false, false, true, true, true, false, false, true, true]
        );
    }
}
