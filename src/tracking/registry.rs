//! Dirty-state registry.
//!
//! # Responsibilities
//! - Per-(assessment, module) "unsaved changes" flags with register/unregister lifecycle
//! - Edge-triggered fan-out to module and assessment subscribers
//! - Level-triggered reminders through the notification channel
//!
//! # Design Decisions
//! - `set_dirty` only notifies on an actual change; writing the same value is silent
//! - Notifications run synchronously, before `set_dirty` returns
//! - The reminder timer belongs to registration, not to dirtiness:
//!   only unregistering stops it
//! - State locks are released before any handler runs

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;

use crate::config::ReminderConfig;
use crate::notify::{
    module_display_name, AnalysisNotice, NotificationChannel, ProgressStage, ProgressUpdate,
};
use crate::observability::metrics;
use crate::tracking::bus::{deliver_isolated, EventBus, Handler};
use crate::tracking::reminders::ReminderScheduler;
use crate::tracking::ModuleKey;

/// Aggregate view of one assessment, delivered to assessment-level subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDirtyState {
    pub is_dirty: bool,
    pub dirty_modules: Vec<String>,
}

/// Handler for module-level changes.
pub type ModuleHandler = Handler<bool>;

/// Handler for assessment-level changes.
pub type AssessmentHandler = Handler<AssessmentDirtyState>;

/// Handle returned by the `on_*` methods. Call [`Subscription::unsubscribe`] to
/// stop receiving events; dropping it leaves the handler registered.
#[must_use = "dropping a Subscription keeps the handler registered"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub(crate) struct Inner {
    /// assessment → module → dirty, in registration order.
    states: Mutex<HashMap<String, IndexMap<String, bool>>>,
    module_bus: EventBus<ModuleKey, bool>,
    assessment_bus: EventBus<String, AssessmentDirtyState>,
    reminders: ReminderScheduler,
    channel: Arc<dyn NotificationChannel>,
}

/// Tracks unsaved changes across assessments and modules.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct DirtyStateRegistry {
    pub(crate) inner: Arc<Inner>,
}

impl DirtyStateRegistry {
    pub fn new(channel: Arc<dyn NotificationChannel>, config: &ReminderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                states: Mutex::new(HashMap::new()),
                module_bus: EventBus::new(),
                assessment_bus: EventBus::new(),
                reminders: ReminderScheduler::new(config.period()),
                channel,
            }),
        }
    }

    /// Start tracking a module, resetting its flag to clean and notifying
    /// subscribers of the reset. Arms the reminder timer once per key.
    pub fn register_module(&self, assessment_id: &str, module: &str) {
        let aggregate = {
            let mut states = self.inner.lock_states();
            let modules = states.entry(assessment_id.to_string()).or_default();
            modules.insert(module.to_string(), false);
            aggregate_of(modules)
        };
        self.inner.notify(assessment_id, module, false, &aggregate);

        let key: ModuleKey = (assessment_id.to_string(), module.to_string());
        let weak = Arc::downgrade(&self.inner);
        let (tick_assessment, tick_module) = key.clone();
        if self.inner.reminders.arm(key, move || {
            reminder_tick(weak.clone(), tick_assessment.clone(), tick_module.clone())
        }) {
            tracing::debug!(assessment = %assessment_id, module = %module, "Module registered, reminder armed");
        }
    }

    /// Set a module's flag. Subscribers hear about it only if the value changed;
    /// becoming dirty also sends one immediate reminder.
    pub fn set_dirty(&self, assessment_id: &str, module: &str, is_dirty: bool) {
        let aggregate = {
            let mut states = self.inner.lock_states();
            let modules = states.entry(assessment_id.to_string()).or_default();
            if modules.get(module) == Some(&is_dirty) {
                return;
            }
            modules.insert(module.to_string(), is_dirty);
            aggregate_of(modules)
        };

        tracing::debug!(assessment = %assessment_id, module = %module, is_dirty, "Dirty state changed");
        self.inner.notify(assessment_id, module, is_dirty, &aggregate);

        if is_dirty {
            spawn_reminder(&self.inner, assessment_id, module);
        }
    }

    /// Shorthand for `set_dirty(assessment_id, module, true)`.
    pub fn mark_dirty(&self, assessment_id: &str, module: &str) {
        self.set_dirty(assessment_id, module, true);
    }

    pub fn is_dirty(&self, assessment_id: &str, module: &str) -> bool {
        self.inner.is_dirty(assessment_id, module)
    }

    pub fn is_assessment_dirty(&self, assessment_id: &str) -> bool {
        self.inner
            .lock_states()
            .get(assessment_id)
            .is_some_and(|modules| modules.values().any(|dirty| *dirty))
    }

    /// Dirty modules of an assessment, in registration order.
    pub fn get_dirty_modules(&self, assessment_id: &str) -> Vec<String> {
        self.inner
            .lock_states()
            .get(assessment_id)
            .map(|modules| aggregate_of(modules).dirty_modules)
            .unwrap_or_default()
    }

    /// Subscribe to one module. The handler is called right away with the
    /// current value, then on every change.
    pub fn on_dirty_state_change(
        &self,
        assessment_id: &str,
        module: &str,
        handler: ModuleHandler,
    ) -> Subscription {
        let key: ModuleKey = (assessment_id.to_string(), module.to_string());
        let id = self.inner.module_bus.subscribe(key.clone(), handler.clone());

        deliver_isolated(&key, &handler, &self.is_dirty(assessment_id, module));

        let weak = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.module_bus.unsubscribe(&key, id);
                }
            })),
        }
    }

    /// Subscribe to the aggregate state of an assessment. The handler is
    /// called right away with the current aggregate, then on every module change.
    pub fn on_assessment_dirty_state_change(
        &self,
        assessment_id: &str,
        handler: AssessmentHandler,
    ) -> Subscription {
        let key = assessment_id.to_string();
        let id = self.inner.assessment_bus.subscribe(key.clone(), handler.clone());

        let current = AssessmentDirtyState {
            is_dirty: self.is_assessment_dirty(assessment_id),
            dirty_modules: self.get_dirty_modules(assessment_id),
        };
        deliver_isolated(&key, &handler, &current);

        let weak = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.assessment_bus.unsubscribe(&key, id);
                }
            })),
        }
    }

    /// Stop tracking a module: cancel its reminder, forget its flag and its subscribers.
    pub fn unregister_module(&self, assessment_id: &str, module: &str) {
        let key: ModuleKey = (assessment_id.to_string(), module.to_string());
        self.inner.reminders.cancel(&key);

        {
            let mut states = self.inner.lock_states();
            if let Some(modules) = states.get_mut(assessment_id) {
                modules.shift_remove(module);
                if modules.is_empty() {
                    states.remove(assessment_id);
                }
            }
        }

        self.inner.module_bus.remove_topic(&key);
        tracing::debug!(assessment = %assessment_id, module = %module, "Module unregistered");
    }

    /// Stop tracking a whole assessment and everything under it.
    pub fn unregister_assessment(&self, assessment_id: &str) {
        let modules: Vec<String> = self
            .inner
            .lock_states()
            .get(assessment_id)
            .map(|modules| modules.keys().cloned().collect())
            .unwrap_or_default();

        for module in &modules {
            self.unregister_module(assessment_id, module);
        }

        self.inner.reminders.cancel_assessment(assessment_id);
        self.inner
            .module_bus
            .retain_topics(|(assessment, _)| assessment != assessment_id);
        self.inner.assessment_bus.remove_topic(&assessment_id.to_string());
        self.inner.lock_states().remove(assessment_id);

        tracing::debug!(assessment = %assessment_id, modules = modules.len(), "Assessment unregistered");
    }

    /// Cancel every timer and drop all state and subscriptions.
    pub fn dispose(&self) {
        self.inner.reminders.cancel_all();
        self.inner.lock_states().clear();
        self.inner.module_bus.clear();
        self.inner.assessment_bus.clear();
        tracing::debug!("Dirty-state registry disposed");
    }

    /// Number of running reminder timers.
    pub fn active_timers(&self) -> usize {
        self.inner.reminders.armed_count()
    }
}

impl Inner {
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, IndexMap<String, bool>>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_dirty(&self, assessment_id: &str, module: &str) -> bool {
        self.lock_states()
            .get(assessment_id)
            .and_then(|modules| modules.get(module).copied())
            .unwrap_or(false)
    }

    fn is_tracked(&self, assessment_id: &str, module: &str) -> bool {
        self.lock_states()
            .get(assessment_id)
            .is_some_and(|modules| modules.contains_key(module))
    }

    fn notify(&self, assessment_id: &str, module: &str, is_dirty: bool, aggregate: &AssessmentDirtyState) {
        let key: ModuleKey = (assessment_id.to_string(), module.to_string());
        self.module_bus.publish(&key, &is_dirty);
        self.assessment_bus.publish(&assessment_id.to_string(), aggregate);
    }

    async fn send_reminder(&self, assessment_id: &str, module: &str) {
        let update = ProgressUpdate::new(
            assessment_id,
            ProgressStage::DirtySaveReminder,
            0,
            format!("{} has unsaved changes", module_display_name(module)),
        );
        if self.deliver(update).await {
            metrics::record_reminder_sent();
        }
    }

    /// Send through the channel, logging instead of failing. Returns whether it was accepted.
    pub(crate) async fn deliver(&self, update: ProgressUpdate) -> bool {
        let stage = update.stage;
        match self.channel.send_progress_update(update).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Failed to send notification");
                metrics::record_notification_failure(stage.as_str());
                false
            }
        }
    }

    pub(crate) async fn deliver_notice(&self, notice: AnalysisNotice) {
        if let Err(e) = self.channel.send_analysis_notification(notice).await {
            tracing::warn!(error = %e, "Failed to send analysis notification");
            metrics::record_notification_failure("analysis_notice");
        }
    }
}

fn aggregate_of(modules: &IndexMap<String, bool>) -> AssessmentDirtyState {
    let dirty_modules: Vec<String> = modules
        .iter()
        .filter(|(_, dirty)| **dirty)
        .map(|(module, _)| module.clone())
        .collect();
    AssessmentDirtyState {
        is_dirty: !dirty_modules.is_empty(),
        dirty_modules,
    }
}

/// Fire one reminder without blocking the caller.
fn spawn_reminder(inner: &Arc<Inner>, assessment_id: &str, module: &str) {
    let Ok(handle) = Handle::try_current() else {
        tracing::warn!(assessment = %assessment_id, module = %module, "No async runtime, reminder dropped");
        return;
    };
    let inner = inner.clone();
    let assessment_id = assessment_id.to_string();
    let module = module.to_string();
    handle.spawn(async move {
        // Unregister or dispose may have run before this task was polled.
        if inner.is_tracked(&assessment_id, &module) {
            inner.send_reminder(&assessment_id, &module).await;
        }
    });
}

/// Body of a periodic tick: remind only while the module is still dirty.
async fn reminder_tick(inner: Weak<Inner>, assessment_id: String, module: String) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if inner.is_dirty(&assessment_id, &module) {
        inner.send_reminder(&assessment_id, &module).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Sink {
        updates: StdMutex<Vec<ProgressUpdate>>,
    }

    #[async_trait]
    impl NotificationChannel for Sink {
        async fn send_progress_update(&self, update: ProgressUpdate) -> Result<(), ChannelError> {
            self.updates.lock().unwrap().push(update);
            Ok(())
        }
    }

    fn registry() -> (DirtyStateRegistry, Arc<Sink>) {
        let sink = Arc::new(Sink::default());
        (DirtyStateRegistry::new(sink.clone(), &ReminderConfig::default()), sink)
    }

    #[test]
    fn test_reads_without_registration() {
        let (registry, _) = registry();
        assert!(!registry.is_dirty("1", "security"));
        assert!(!registry.is_assessment_dirty("1"));
        assert!(registry.get_dirty_modules("1").is_empty());
    }

    #[test]
    fn test_subscribe_replays_current_value_then_edges() {
        let (registry, _) = registry();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();

        let sub = registry.on_dirty_state_change("1", "devops", Arc::new(move |v: &bool| s.lock().unwrap().push(*v)));
        registry.set_dirty("1", "devops", false);
        registry.set_dirty("1", "devops", true);
        registry.set_dirty("1", "devops", true);
        sub.unsubscribe();
        registry.set_dirty("1", "devops", false);

        // initial replay, the first false (new entry), then true
        assert_eq!(*seen.lock().unwrap(), vec![false, false, true]);
    }

    #[test]
    fn test_register_resets_and_notifies() {
        let (registry, _) = registry();
        registry.set_dirty("1", "security", true);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = registry.on_assessment_dirty_state_change(
            "1",
            Arc::new(move |state: &AssessmentDirtyState| s.lock().unwrap().push(state.clone())),
        );

        registry.register_module("1", "security");
        assert!(!registry.is_dirty("1", "security"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].dirty_modules, vec!["security".to_string()]);
        assert!(!seen[1].is_dirty);
    }

    #[test]
    fn test_dirty_modules_keep_registration_order() {
        let (registry, _) = registry();
        for module in ["security", "architecture", "devops"] {
            registry.register_module("5", module);
        }
        registry.mark_dirty("5", "devops");
        registry.mark_dirty("5", "security");

        assert_eq!(registry.get_dirty_modules("5"), vec!["security", "devops"]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_unregister_assessment_clears_everything() {
        let (registry, _) = registry();
        registry.register_module("1", "a");
        registry.register_module("1", "b");
        registry.register_module("2", "a");
        registry.mark_dirty("1", "a");
        assert_eq!(registry.active_timers(), 3);

        registry.unregister_assessment("1");
        assert_eq!(registry.active_timers(), 1);
        assert!(!registry.is_assessment_dirty("1"));
        assert_eq!(registry.inner.module_bus.subscriber_count(&("1".into(), "a".into())), 0);

        registry.dispose();
        assert_eq!(registry.active_timers(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_transition_into_dirty_sends_immediate_reminder() {
        let (registry, sink) = registry();
        registry.register_module("3", "cloud-readiness");
        registry.mark_dirty("3", "cloud-readiness");
        registry.mark_dirty("3", "cloud-readiness");
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let updates = sink.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].stage, ProgressStage::DirtySaveReminder);
        assert_eq!(updates[0].message, "Cloud Readiness has unsaved changes");
    }

    #[test]
    fn test_last_module_removal_drops_assessment_entry() {
        let (registry, _) = registry();
        registry.set_dirty("9", "security", false);
        assert!(registry.inner.lock_states().contains_key("9"));

        registry.unregister_module("9", "security");
        assert!(!registry.inner.lock_states().contains_key("9"));
    }

    #[test]
    fn test_panicking_replay_still_returns_subscription() {
        let (registry, _) = registry();
        let key: ModuleKey = ("1".into(), "devops".into());

        let sub = registry.on_dirty_state_change("1", "devops", Arc::new(|_: &bool| panic!("subscriber bug")));
        assert_eq!(registry.inner.module_bus.subscriber_count(&key), 1);

        sub.unsubscribe();
        assert_eq!(registry.inner.module_bus.subscriber_count(&key), 0);

        let aggregate = registry.on_assessment_dirty_state_change(
            "1",
            Arc::new(|_: &AssessmentDirtyState| panic!("subscriber bug")),
        );
        assert_eq!(registry.inner.assessment_bus.subscriber_count(&"1".to_string()), 1);
        aggregate.unsubscribe();
        assert_eq!(registry.inner.assessment_bus.subscriber_count(&"1".to_string()), 0);
    }
}
