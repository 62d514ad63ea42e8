//! Sliding-window request throttle for registration.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RegisterThrottleConfig;

/// Per-client sliding window over recent request timestamps.
///
/// State is in-memory only; a restart clears all windows.
pub struct RegisterThrottle {
    max_attempts: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RegisterThrottle {
    #[must_use]
    pub fn new(config: &RegisterThrottleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts as usize,
            window: Duration::from_secs(config.window_seconds),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `client` and report whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another request panicked mid-check;
            // the window data is still usable
            Err(poisoned) => poisoned.into_inner(),
        };

        // Prune expired attempts everywhere and drop clients whose window
        // emptied, so idle clients do not accumulate in the map.
        for attempts in windows.values_mut() {
            while let Some(&oldest) = attempts.front() {
                if now.duration_since(oldest) >= self.window {
                    attempts.pop_front();
                } else {
                    break;
                }
            }
        }
        windows.retain(|_, attempts| !attempts.is_empty());

        let attempts = windows.entry(client.to_string()).or_default();

        if attempts.len() >= self.max_attempts {
            return false;
        }

        attempts.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(max_attempts: u32, window_seconds: u64) -> RegisterThrottle {
        RegisterThrottle::new(&RegisterThrottleConfig {
            max_attempts,
            window_seconds,
        })
    }

    #[test]
    fn test_allows_up_to_limit() {
        let throttle = throttle(3, 60);

        assert!(throttle.check("1.2.3.4"));
        assert!(throttle.check("1.2.3.4"));
        assert!(throttle.check("1.2.3.4"));
        assert!(!throttle.check("1.2.3.4"));
    }

    #[test]
    fn test_clients_are_independent() {
        let throttle = throttle(1, 60);

        assert!(throttle.check("1.2.3.4"));
        assert!(!throttle.check("1.2.3.4"));
        assert!(throttle.check("5.6.7.8"));
    }

    #[test]
    fn test_idle_clients_are_swept() {
        let throttle = throttle(5, 60);
        let start = Instant::now();

        assert!(throttle.check_at("1.2.3.4", start));
        assert!(throttle.check_at("5.6.7.8", start + Duration::from_secs(61)));

        // The first client's window has fully expired and its key is gone
        let windows = throttle.windows.lock().unwrap();
        assert!(!windows.contains_key("1.2.3.4"));
        assert!(windows.contains_key("5.6.7.8"));
    }

    #[test]
    fn test_window_expiry_frees_capacity() {
        let throttle = throttle(1, 60);
        let start = Instant::now();

        assert!(throttle.check_at("1.2.3.4", start));
        assert!(!throttle.check_at("1.2.3.4", start + Duration::from_secs(30)));
        assert!(throttle.check_at("1.2.3.4", start + Duration::from_secs(61)));
    }
}
