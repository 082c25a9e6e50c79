//! Periodic reminder timers.
//!
//! # Responsibilities
//! - One repeating timer per registered (assessment, module)
//! - Run a caller-supplied tick on a fixed period until cancelled
//!
//! # Design Decisions
//! - Level-triggered: the tick decides what to do from current state, the
//!   timer knows nothing about dirtiness
//! - Every timer is a child of one root token; `cancel_all` (and drop) stop them all
//! - First tick fires one full period after arming

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::tracking::ModuleKey;

/// Owns the reminder timers.
pub struct ReminderScheduler {
    period: Duration,
    root: CancellationToken,
    timers: Mutex<HashMap<ModuleKey, CancellationToken>>,
}

impl ReminderScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            root: CancellationToken::new(),
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start a timer for `key` unless one is already running.
    ///
    /// Returns `true` if a new timer was started. Needs a Tokio runtime; without
    /// one the timer is skipped and logged.
    pub fn arm<F, Fut>(&self, key: ModuleKey, on_tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut timers = self.lock();
        if timers.contains_key(&key) {
            return false;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(assessment = %key.0, module = %key.1, "No async runtime, reminder timer not armed");
                return false;
            }
        };

        let token = self.root.child_token();
        let period = self.period;
        let task_token = token.clone();
        let (assessment, module) = key.clone();

        handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        on_tick().await;
                    }
                }
            }
            tracing::debug!(assessment = %assessment, module = %module, "Reminder timer stopped");
        });

        timers.insert(key, token);
        true
    }

    /// Stop the timer for `key`. Returns `false` if none was running.
    pub fn cancel(&self, key: &ModuleKey) -> bool {
        match self.lock().remove(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every timer belonging to `assessment_id`.
    pub fn cancel_assessment(&self, assessment_id: &str) {
        self.lock().retain(|(assessment, _), token| {
            if assessment == assessment_id {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Stop every timer. Timers armed afterwards are cancelled immediately.
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.lock().clear();
    }

    pub fn is_armed(&self, key: &ModuleKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn armed_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModuleKey, CancellationToken>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
