use super::*;
use crate::{
    paging::LoadPhase,
    test_support::{products, ScriptedCatalog},
};
use tokio_stream::wrappers::ReceiverStream;

fn page(current_page: u32, has_more: bool, phase: LoadPhase) -> PageState {
    PageState {
        current_page,
        has_more,
        phase,
    }
}

#[test]
fn trigger_arms_only_with_mounted_sentinel_and_more_pages() {
    let mut trigger = ScrollTrigger::new();
    trigger.observe(&page(1, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Idle);

    trigger.sentinel_mounted(&page(1, false, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Idle);

    trigger.observe(&page(1, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Armed);
    assert_eq!(trigger.root_margin_px(), 200);
}

#[test]
fn trigger_fires_once_until_the_fetch_settles() {
    let mut trigger = ScrollTrigger::new();
    let idle = page(1, true, LoadPhase::Idle);
    trigger.sentinel_mounted(&idle);

    assert!(!trigger.on_intersection(false, &idle));
    assert!(trigger.on_intersection(true, &idle));
    assert_eq!(trigger.state(), TriggerState::Firing);

    let loading = page(2, true, LoadPhase::LoadingNext);
    for _ in 0..5 {
        assert!(!trigger.on_intersection(true, &loading));
    }
    assert_eq!(trigger.state(), TriggerState::Firing);

    trigger.on_fetch_settled(&page(2, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Armed);
    trigger.on_fetch_settled(&page(3, false, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Idle);
}

#[test]
fn trigger_refuses_while_any_load_is_pending() {
    let mut trigger = ScrollTrigger::new();
    trigger.sentinel_mounted(&page(1, true, LoadPhase::LoadingFirst));
    assert!(!trigger.on_intersection(true, &page(1, true, LoadPhase::LoadingFirst)));
    assert_eq!(trigger.state(), TriggerState::Armed);
}

#[test]
fn unmount_tears_down_to_idle() {
    let mut trigger = ScrollTrigger::new();
    let idle = page(1, true, LoadPhase::Idle);
    trigger.sentinel_mounted(&idle);
    assert!(trigger.on_intersection(true, &idle));

    trigger.sentinel_unmounted();
    assert_eq!(trigger.state(), TriggerState::Idle);
    assert!(!trigger.is_sentinel_mounted());
    trigger.on_fetch_settled(&page(2, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Idle);
    assert!(!trigger.on_intersection(true, &page(2, true, LoadPhase::Idle)));
}

#[test]
fn page_limit_stops_arming() {
    let mut trigger = ScrollTrigger::new().with_page_limit(2);
    trigger.sentinel_mounted(&page(1, true, LoadPhase::Idle));
    assert!(trigger.on_intersection(true, &page(1, true, LoadPhase::Idle)));
    trigger.on_fetch_settled(&page(2, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Idle);
}

#[test]
fn session_reset_holds_until_first_page_settles() {
    let mut trigger = ScrollTrigger::new();
    let idle = page(1, true, LoadPhase::Idle);
    trigger.sentinel_mounted(&idle);
    assert!(trigger.on_intersection(true, &idle));

    trigger.session_reset();
    assert_eq!(trigger.state(), TriggerState::Idle);
    trigger.on_fetch_settled(&idle);
    assert_eq!(trigger.state(), TriggerState::Idle);
    assert!(!trigger.on_intersection(true, &idle));

    trigger.first_page_settled(&page(1, true, LoadPhase::Idle));
    assert_eq!(trigger.state(), TriggerState::Armed);
    assert!(trigger.on_intersection(true, &idle));
}

#[tokio::test]
async fn intersections_during_a_fetch_are_suppressed() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 12), 3);
    let release = api.push_gated_ok("", 2, products("b", 12), 3);
    api.push_ok("", 3, products("c", 5), 3);
    let listing = ListingController::new(api.clone());
    listing.load_page(1, true).await;

    let scroll = InfiniteScroll::new(Arc::clone(&listing));
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    for _ in 0..4 {
        tx.send(VisibilityEvent::Intersection { intersecting: true })
            .await
            .expect("send");
    }
    api.wait_for_requests(2).await;
    status
        .wait_for(|status| status.events_seen == 5)
        .await
        .expect("driver running");
    assert_eq!(listing.page_state().await.current_page, 2);

    release.send(()).expect("release");
    status
        .wait_for(|status| status.fired == 2 && !status.fetching)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 2);
    assert_eq!(summary.suppressed, 3);
    assert_eq!(summary.state, TriggerState::Idle);
    assert_eq!(listing.items().await.len(), 29);
    assert_eq!(listing.page_state().await.current_page, 3);
    assert_eq!(api.request_count(), 3);
}

#[tokio::test]
async fn unmounted_sentinel_never_fires() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 12), 2);
    let listing = ListingController::new(api.clone());
    listing.load_page(1, true).await;

    let scroll = InfiniteScroll::new(Arc::clone(&listing));
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    tx.send(VisibilityEvent::SentinelUnmounted)
        .await
        .expect("send");
    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    status
        .wait_for(|status| status.events_seen == 3)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 0);
    assert_eq!(summary.suppressed, 1);
    assert_eq!(api.request_count(), 1);
    assert_eq!(listing.page_state().await.current_page, 1);
}

#[tokio::test]
async fn filter_change_rearms_after_first_page() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 4), 1);
    api.push_ok("trail", 1, products("t", 12), 2);
    api.push_ok("trail", 2, products("t2", 3), 2);
    let listing = ListingController::new(api.clone());
    listing.load_page(1, true).await;

    let scroll = InfiniteScroll::new(Arc::clone(&listing));
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    status
        .wait_for(|status| status.events_seen == 2)
        .await
        .expect("driver running");
    assert_eq!(status.borrow().state, TriggerState::Idle);
    assert_eq!(status.borrow().suppressed, 1);

    assert!(listing.set_search("trail").await);
    listing.load_page(1, true).await;
    status
        .wait_for(|status| status.fired == 1 && !status.fetching)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 1);
    let mut expected = products("t", 12);
    expected.extend(products("t2", 3));
    assert_eq!(listing.items().await, expected);
    assert!(!listing.page_state().await.has_more);
}

#[tokio::test]
async fn page_limit_caps_a_visible_sentinel() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 12), 5);
    api.push_ok("", 2, products("b", 12), 5);
    let listing = ListingController::new(api.clone());
    listing.load_page(1, true).await;

    let scroll = InfiniteScroll::new(Arc::clone(&listing)).with_page_limit(2);
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    status
        .wait_for(|status| status.fired == 1 && !status.fetching)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 1);
    assert_eq!(listing.items().await.len(), 24);
    assert_eq!(api.request_count(), 2);
}

#[tokio::test]
async fn search_change_while_firing_waits_for_the_new_first_page() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 12), 3);
    let release = api.push_gated_ok("", 2, products("b", 12), 3);
    api.push_ok("trail", 1, products("t", 12), 2);
    api.push_ok("trail", 2, products("t2", 3), 2);
    let listing = ListingController::new(api.clone());
    listing.load_page(1, true).await;

    let scroll = InfiniteScroll::new(Arc::clone(&listing));
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    api.wait_for_requests(2).await;
    status
        .wait_for(|status| status.events_seen == 2 && status.state == TriggerState::Firing)
        .await
        .expect("driver running");

    assert!(listing.set_search("trail").await);
    status
        .wait_for(|status| status.state == TriggerState::Idle)
        .await
        .expect("driver running");
    release.send(()).expect("release");
    status
        .wait_for(|status| status.fired == 1 && !status.fetching)
        .await
        .expect("driver running");

    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    status
        .wait_for(|status| status.events_seen == 3)
        .await
        .expect("driver running");
    let held = *status.borrow();
    assert_eq!(held.state, TriggerState::Idle);
    assert_eq!(held.suppressed, 1);
    assert!(!held.fetching);
    assert_eq!(api.request_count(), 2);
    assert!(listing.items().await.is_empty());

    listing.load_page(1, true).await;
    status
        .wait_for(|status| status.fired == 2 && !status.fetching)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 2);
    assert_eq!(summary.suppressed, 1);
    assert_eq!(summary.state, TriggerState::Idle);
    let mut expected = products("t", 12);
    expected.extend(products("t2", 3));
    assert_eq!(listing.items().await, expected);
    assert_eq!(api.request_count(), 4);
    let last = api.queries().pop().expect("query");
    assert_eq!(last.search.as_deref(), Some("trail"));
    assert_eq!(last.page, 2);
}

#[tokio::test]
async fn refused_advance_does_not_refire() {
    let api = ScriptedCatalog::new();
    api.push_ok("", 1, products("a", 12), 2);
    api.push_ok("", 2, products("b", 3), 2);
    let listing = ListingController::new(api.clone());

    let scroll = InfiniteScroll::new(Arc::clone(&listing));
    let mut status = scroll.status();
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(scroll.run(ReceiverStream::new(rx)));

    tx.send(VisibilityEvent::SentinelMounted).await.expect("send");
    tx.send(VisibilityEvent::Intersection { intersecting: true })
        .await
        .expect("send");
    status
        .wait_for(|status| status.events_seen == 2 && !status.fetching)
        .await
        .expect("driver running");
    let refused = *status.borrow();
    assert_eq!(refused.fired, 0);
    assert_eq!(refused.suppressed, 1);
    assert_eq!(refused.state, TriggerState::Armed);
    assert!(!refused.fetching);
    assert_eq!(api.request_count(), 0);

    listing.load_page(1, true).await;
    status
        .wait_for(|status| status.fired == 1 && !status.fetching)
        .await
        .expect("driver running");
    drop(tx);
    let summary = driver.await.expect("join");

    assert_eq!(summary.fired, 1);
    assert_eq!(summary.suppressed, 1);
    assert_eq!(listing.items().await.len(), 15);
    assert_eq!(api.request_count(), 2);
}
