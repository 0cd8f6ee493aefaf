//! Concurrent deployment events against one registry.
//!
//! Verifies that many keys and many processes reconcile in parallel without
//! lost registrations, double activations or deadlocks, and that a slow
//! activation never blocks unrelated keys.

use std::time::Duration;

mod common;

use common::{Behavior, Harness, WEBHOOK, element, event};
use inbound_runtime::{ActiveExecutableQuery, Health, HealthStatus, RegistrationStatus};
use pretty_assertions::assert_eq;
use tokio::task::JoinSet;

const TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_event_with_100_keys() {
    let h = Harness::new();
    let recorder = h.register(WEBHOOK, Behavior::Delay(Duration::from_millis(5)));

    let elements = (0..100)
        .map(|i| element("orders", &format!("E{i}"), &format!("k{i}"), WEBHOOK, &[]))
        .collect();
    tokio::time::timeout(TIMEOUT, h.registry.handle_event(event("orders", 1, elements)))
        .await
        .expect("event handled in time");

    assert_eq!(recorder.activations(), 100);
    assert_eq!(h.registry.len(), 100);
    let views = h.registry.query(&ActiveExecutableQuery::new());
    assert!(views.iter().all(|v| v.status == RegistrationStatus::Activated));
    assert!(h.registry.aggregate_health().is_up());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_from_100_processes_in_parallel() {
    let h = Harness::new();
    let recorder = h.register(WEBHOOK, Behavior::Succeed);

    let mut set = JoinSet::new();
    for i in 0..100 {
        let registry = h.registry.clone();
        set.spawn(async move {
            let process = format!("process-{i}");
            registry
                .handle_event(event(
                    &process,
                    1,
                    vec![element(&process, "Start", &format!("k{i}"), WEBHOOK, &[])],
                ))
                .await;
        });
    }
    tokio::time::timeout(TIMEOUT, async {
        while let Some(joined) = set.join_next().await {
            joined.expect("task panicked");
        }
    })
    .await
    .expect("events handled in time");

    assert_eq!(recorder.activations(), 100);
    assert_eq!(recorder.deactivations(), 0);
    assert_eq!(h.registry.len(), 100);
    assert_eq!(h.registry.status_report().values().sum::<usize>(), 100);
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_activation_does_not_block_other_processes() {
    const SLOW: &str = "io.camunda:slow:1";

    let h = Harness::new();
    let slow = h.register(SLOW, Behavior::Delay(Duration::from_mins(1)));
    h.register(WEBHOOK, Behavior::Succeed);

    let registry = h.registry.clone();
    let stuck = tokio::spawn(async move {
        registry
            .handle_event(event(
                "billing",
                1,
                vec![element("billing", "S", "slow-key", SLOW, &[])],
            ))
            .await;
    });
    common::eventually(|| slow.activations() == 1).await;

    tokio::time::timeout(
        Duration::from_secs(2),
        h.registry.handle_event(event(
            "orders",
            1,
            vec![element("orders", "E", "k1", WEBHOOK, &[])],
        )),
    )
    .await
    .expect("unrelated process was blocked");

    assert_eq!(h.view("k1").status, RegistrationStatus::Activated);
    assert!(h.try_view("slow-key").is_none());
    assert_eq!(h.registry.query(&ActiveExecutableQuery::new()).len(), 1);
    stuck.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_key_from_two_processes_converges() {
    let h = Harness::new();
    let recorder = h.register(WEBHOOK, Behavior::Delay(Duration::from_millis(20)));

    let mut set = JoinSet::new();
    for process in ["orders", "refunds"] {
        let registry = h.registry.clone();
        set.spawn(async move {
            registry
                .handle_event(event(
                    process,
                    1,
                    vec![element(process, "Start", "shared", WEBHOOK, &[])],
                ))
                .await;
        });
    }
    tokio::time::timeout(TIMEOUT, async {
        while let Some(joined) = set.join_next().await {
            joined.expect("task panicked");
        }
    })
    .await
    .expect("events handled in time");

    let view = h.view("shared");
    let processes: Vec<_> = view
        .elements
        .iter()
        .map(|e| e.process_id.as_str())
        .collect();
    assert_eq!(processes, ["orders", "refunds"]);
    assert_eq!(view.status, RegistrationStatus::Activated);
    assert_eq!(recorder.activations(), 2);
    assert_eq!(recorder.deactivations(), 1);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_health_reports_are_all_applied() {
    let h = Harness::new();
    let recorder = h.register(WEBHOOK, Behavior::Succeed);
    let elements = (0..100)
        .map(|i| element("orders", &format!("E{i}"), &format!("k{i}"), WEBHOOK, &[]))
        .collect();
    h.registry.handle_event(event("orders", 1, elements)).await;

    let contexts = recorder.contexts.lock().clone();
    let mut set = JoinSet::new();
    for context in contexts {
        set.spawn(async move {
            for _ in 0..10 {
                context.report_health(Health::up());
                tokio::task::yield_now().await;
            }
            context.report_health(Health::down("upstream unavailable"));
        });
    }
    while let Some(joined) = set.join_next().await {
        joined.expect("task panicked");
    }

    let views = h.registry.query(&ActiveExecutableQuery::new());
    assert_eq!(views.len(), 100);
    assert!(views.iter().all(|v| v.health.status == HealthStatus::Down));
    assert_eq!(
        h.registry.aggregate_health().error_message(),
        Some("100 of 100 connectors are down")
    );
}
