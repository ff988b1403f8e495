use shardscope::{
    ClusterMembershipService, ClusterSnapshot, ClusterStateObserver, InMemoryClusterService,
    ObservedChange,
};
use std::sync::Arc;
use std::time::Duration;

fn service() -> Arc<InMemoryClusterService> {
    Arc::new(InMemoryClusterService::new(ClusterSnapshot::new()))
}

#[tokio::test]
async fn observer_returns_first_matching_state() {
    let service = service();
    let initial = service.current_state();
    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_secs(5));

    let publisher = service.clone();
    tokio::spawn(async move {
        publisher.update(|state| state.add_node("n1")).unwrap();
        publisher.update(|state| state.add_node("n2")).unwrap();
    });

    match observer
        .wait_for_change(|state| state.nodes().contains("n2"))
        .await
    {
        ObservedChange::NewState(state) => {
            assert!(state.version() >= 3);
            assert!(state.nodes().contains("n1"));
        }
        other => panic!("unexpected change {:?}", other),
    }
}

#[tokio::test]
async fn observer_skips_the_state_it_was_created_from() {
    let service = service();
    let initial = service.current_state();
    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_millis(30));

    let mut evaluated = Vec::new();
    let change = observer
        .wait_for_change(|state| {
            evaluated.push(state.version());
            true
        })
        .await;

    assert!(matches!(change, ObservedChange::TimedOut));
    assert!(evaluated.is_empty());
    assert!(observer.is_expired());
}

#[tokio::test]
async fn state_published_before_subscribing_is_evaluated() {
    let service = service();
    let initial = service.current_state();
    service.update(|state| state.add_node("n1")).unwrap();

    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_secs(5));
    match observer.wait_for_change(|_| true).await {
        ObservedChange::NewState(state) => assert_eq!(state.version(), 2),
        other => panic!("unexpected change {:?}", other),
    }
}

#[tokio::test]
async fn closed_service_is_reported() {
    let service = service();
    let initial = service.current_state();
    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_secs(5));

    service.close().unwrap();
    assert!(matches!(
        observer.wait_for_change(|_| true).await,
        ObservedChange::ServiceClosed
    ));
}

#[tokio::test]
async fn deadline_is_fixed_at_creation() {
    let service = service();
    let initial = service.current_state();
    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_millis(40));
    let deadline = observer.deadline();

    for _ in 0..3 {
        service.update(|state| state.add_node("n1").or(Ok(()))).unwrap();
    }
    assert!(matches!(
        observer.wait_for_change(|_| false).await,
        ObservedChange::TimedOut
    ));
    assert_eq!(observer.deadline(), deadline);
    assert!(tokio::time::Instant::now() >= deadline);
}

#[tokio::test]
async fn next_change_collapses_states_published_while_busy() {
    let service = service();
    let initial = service.current_state();
    let mut observer =
        ClusterStateObserver::new(service.as_ref(), &initial, Duration::from_millis(50));

    service.update(|state| state.add_node("n1")).unwrap();
    service.update(|state| state.add_node("n2")).unwrap();
    match observer.next_change().await {
        ObservedChange::NewState(state) => assert_eq!(state.version(), 3),
        other => panic!("unexpected change {:?}", other),
    }
    assert!(matches!(
        observer.next_change().await,
        ObservedChange::TimedOut
    ));
}
