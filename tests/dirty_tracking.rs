//! Dirty-state tracking, reminders, and analysis progress notifications.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assessment_guard::config::ReminderConfig;
use assessment_guard::notify::ProgressStage;
use assessment_guard::tracking::{AssessmentDirtyState, DirtyStateRegistry};

use common::{settle, FailingChannel, RecordingChannel};

fn registry(channel: &Arc<RecordingChannel>) -> DirtyStateRegistry {
    DirtyStateRegistry::new(channel.clone(), &ReminderConfig::default())
}

fn reminders(channel: &RecordingChannel) -> Vec<String> {
    channel
        .updates()
        .into_iter()
        .filter(|u| u.stage == ProgressStage::DirtySaveReminder)
        .map(|u| u.message)
        .collect()
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_repeated_dirty_notifies_once() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "security");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _sub = registry.on_dirty_state_change("1", "security", Arc::new(move |v: &bool| s.lock().unwrap().push(*v)));

    registry.set_dirty("1", "security", true);
    registry.set_dirty("1", "security", true);
    registry.set_dirty("1", "security", false);

    // initial replay, then one event per edge
    assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);

    settle().await;
    assert_eq!(reminders(&channel).len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_unregister_stops_reminders() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "devops");
    registry.mark_dirty("1", "devops");
    settle().await;
    assert_eq!(reminders(&channel).len(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(reminders(&channel).len(), 2);

    registry.unregister_module("1", "devops");
    assert_eq!(registry.active_timers(), 0);

    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(reminders(&channel).len(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_clean_module_gets_no_periodic_reminder() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "infrastructure");
    registry.mark_dirty("1", "infrastructure");
    registry.set_dirty("1", "infrastructure", false);
    settle().await;

    tokio::time::advance(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(reminders(&channel).len(), 1);
    assert_eq!(registry.active_timers(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_aggregate_state() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("id", "a");
    registry.register_module("id", "b");
    registry.set_dirty("id", "a", true);
    registry.set_dirty("id", "b", false);

    assert!(registry.is_assessment_dirty("id"));
    assert_eq!(registry.get_dirty_modules("id"), vec!["a".to_string()]);
    assert!(registry.is_dirty("id", "a"));
    assert!(!registry.is_dirty("id", "b"));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_architecture_reminder_scenario() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("42", "architecture");

    let module_events = Arc::new(Mutex::new(Vec::new()));
    let aggregate_events = Arc::new(Mutex::new(Vec::new()));
    let m = module_events.clone();
    let a = aggregate_events.clone();
    let _module_sub =
        registry.on_dirty_state_change("42", "architecture", Arc::new(move |v: &bool| m.lock().unwrap().push(*v)));
    let _assessment_sub = registry.on_assessment_dirty_state_change(
        "42",
        Arc::new(move |state: &AssessmentDirtyState| a.lock().unwrap().push(state.clone())),
    );

    registry.set_dirty("42", "architecture", true);

    assert_eq!(module_events.lock().unwrap().last(), Some(&true));
    assert_eq!(
        aggregate_events.lock().unwrap().last(),
        Some(&AssessmentDirtyState {
            is_dirty: true,
            dirty_modules: vec!["architecture".to_string()],
        })
    );

    settle().await;
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;

    let sent = reminders(&channel);
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.contains("Architecture Review")));
    assert!(channel.updates().iter().all(|u| u.assessment_id == "42" && u.percent == 0));

    registry.dispose();
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_failed_analysis_scenario() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);

    let task_registry = registry.clone();
    let handle = tokio::spawn(async move {
        task_registry
            .start_ai_analysis("7", "security", || async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Err::<String, String>("model overloaded".to_string())
            })
            .await
    });

    settle().await;
    let updates = channel.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].stage, ProgressStage::AiAnalysisStarted);
    assert_eq!(updates[0].message, "Starting Security Assessment AI analysis...");

    tokio::time::advance(Duration::from_secs(2)).await;
    let result = handle.await.unwrap();
    assert_eq!(result, Err("model overloaded".to_string()));

    let updates = channel.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].stage, ProgressStage::AiAnalysisFailed);
    assert_eq!(updates[1].message, "Security Assessment AI analysis failed: model overloaded");
    assert!(channel.notices().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_subscriber_panic_does_not_block_others() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "recommendations");

    let _faulty = registry.on_dirty_state_change(
        "1",
        "recommendations",
        Arc::new(|v: &bool| {
            if *v {
                panic!("subscriber bug");
            }
        }),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _healthy =
        registry.on_dirty_state_change("1", "recommendations", Arc::new(move |v: &bool| s.lock().unwrap().push(*v)));

    registry.mark_dirty("1", "recommendations");

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    assert!(registry.is_dirty("1", "recommendations"));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_unregister_before_reminder_runs_sends_nothing() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "devops");
    registry.mark_dirty("1", "devops");
    registry.unregister_module("1", "devops");

    settle().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(reminders(&channel).is_empty());
    assert_eq!(registry.active_timers(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_dispose_before_reminder_runs_sends_nothing() {
    let channel = RecordingChannel::new();
    let registry = registry(&channel);
    registry.register_module("1", "security");
    registry.mark_dirty("1", "security");
    registry.dispose();

    settle().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(channel.updates().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_reminders_keep_firing_while_transport_is_down() {
    let channel = FailingChannel::new();
    let registry = DirtyStateRegistry::new(channel.clone(), &ReminderConfig::default());
    registry.register_module("1", "architecture");
    registry.mark_dirty("1", "architecture");
    settle().await;
    assert_eq!(channel.attempts(), 1);

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
    }

    // one immediate attempt plus one per tick
    assert_eq!(channel.attempts(), 4);
    assert_eq!(registry.active_timers(), 1);
    assert!(registry.is_dirty("1", "architecture"));
}
