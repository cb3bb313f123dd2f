use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, mpsc, watch};
use tracing::{debug, trace};

use crate::{
    listing::{ListingController, ListingEvent, LoadOutcome},
    paging::PageState,
};

/// Distance below the viewport at which the sentinel already counts as visible.
pub const SENTINEL_ROOT_MARGIN_PX: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    #[default]
    Idle,
    Armed,
    Firing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    SentinelMounted,
    SentinelUnmounted,
    Intersection { intersecting: bool },
}

#[derive(Debug, Clone, Default)]
pub struct ScrollTrigger {
    state: TriggerState,
    sentinel_mounted: bool,
    awaiting_first_page: bool,
    page_limit: Option<u32>,
}

impl ScrollTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit.max(1));
        self
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn root_margin_px(&self) -> u32 {
        SENTINEL_ROOT_MARGIN_PX
    }

    pub fn is_sentinel_mounted(&self) -> bool {
        self.sentinel_mounted
    }

    pub fn sentinel_mounted(&mut self, page: &PageState) {
        self.sentinel_mounted = true;
        self.observe(page);
    }

    // A fetch already in flight is left to finish.
    pub fn sentinel_unmounted(&mut self) {
        self.sentinel_mounted = false;
        self.state = TriggerState::Idle;
    }

    /// Disarms until the new session's first page has settled.
    pub fn session_reset(&mut self) {
        self.awaiting_first_page = true;
        self.state = TriggerState::Idle;
    }

    pub fn first_page_settled(&mut self, page: &PageState) {
        self.awaiting_first_page = false;
        self.observe(page);
    }

    pub fn observe(&mut self, page: &PageState) {
        if !self.can_arm(page) {
            self.state = TriggerState::Idle;
        } else if self.state == TriggerState::Idle {
            self.state = TriggerState::Armed;
        }
    }

    pub fn on_intersection(&mut self, intersecting: bool, page: &PageState) -> bool {
        self.observe(page);
        if !intersecting || self.state != TriggerState::Armed || page.is_loading() {
            return false;
        }
        self.state = TriggerState::Firing;
        true
    }

    pub fn on_fetch_settled(&mut self, page: &PageState) {
        if self.state == TriggerState::Firing {
            self.state = TriggerState::Armed;
        }
        self.observe(page);
    }

    fn can_arm(&self, page: &PageState) -> bool {
        self.sentinel_mounted
            && !self.awaiting_first_page
            && page.has_more
            && self
                .page_limit
                .map_or(true, |limit| page.current_page < limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScrollStatus {
    pub state: TriggerState,
    pub events_seen: u32,
    pub fired: u32,
    /// Intersections that could not fire, including advances the listing refused.
    pub suppressed: u32,
    pub fetching: bool,
}

type Settled = Option<LoadOutcome>;

pub struct InfiniteScroll {
    listing: Arc<ListingController>,
    trigger: ScrollTrigger,
    intersecting: bool,
    in_flight: usize,
    counters: ScrollStatus,
    status: watch::Sender<ScrollStatus>,
}

impl InfiniteScroll {
    pub fn new(listing: Arc<ListingController>) -> Self {
        let (status, _) = watch::channel(ScrollStatus::default());
        Self {
            listing,
            trigger: ScrollTrigger::new(),
            intersecting: false,
            in_flight: 0,
            counters: ScrollStatus::default(),
            status,
        }
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.trigger = self.trigger.with_page_limit(limit);
        self
    }

    pub fn status(&self) -> watch::Receiver<ScrollStatus> {
        self.status.subscribe()
    }

    /// Drives the trigger until `events` ends, then waits for any fetch it
    /// started. While the sentinel stays visible each settled page fires the next.
    pub async fn run<S>(mut self, events: S) -> ScrollStatus
    where
        S: Stream<Item = VisibilityEvent>,
    {
        tokio::pin!(events);
        let mut listing_events = self.listing.subscribe_events();
        let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<Settled>();

        loop {
            // Visibility events drain before settlements so an intersection
            // queued during a fetch is judged against the firing state.
            tokio::select! {
                biased;
                event = events.next() => match event {
                    Some(event) => self.on_visibility(event, &settled_tx).await,
                    None => break,
                },
                notice = listing_events.recv() => match notice {
                    Ok(ListingEvent::FiltersChanged { generation, .. }) => {
                        self.on_filters_changed(generation)
                    }
                    Ok(ListingEvent::PageLoaded { page, .. })
                    | Ok(ListingEvent::LoadFailed { page, .. }) => {
                        self.on_listing_settled(page == 1, &settled_tx).await
                    }
                    // A missed page-1 settlement must not leave the trigger disarmed.
                    Err(RecvError::Lagged(_)) => self.on_listing_settled(true, &settled_tx).await,
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                },
                Some(outcome) = settled_rx.recv() => {
                    self.on_fetch_settled(outcome, &settled_tx).await
                }
            }
        }

        self.intersecting = false;
        self.trigger.sentinel_unmounted();
        while self.in_flight > 0 {
            match settled_rx.recv().await {
                Some(outcome) => self.on_fetch_settled(outcome, &settled_tx).await,
                None => break,
            }
        }
        self.publish();
        debug!(
            fired = self.counters.fired,
            suppressed = self.counters.suppressed,
            "infinite scroll stopped"
        );
        self.counters
    }

    async fn on_visibility(
        &mut self,
        event: VisibilityEvent,
        settled_tx: &mpsc::UnboundedSender<Settled>,
    ) {
        let page = self.listing.page_state().await;
        match event {
            VisibilityEvent::SentinelMounted => {
                self.intersecting = false;
                self.trigger.sentinel_mounted(&page);
            }
            VisibilityEvent::SentinelUnmounted => {
                self.intersecting = false;
                self.trigger.sentinel_unmounted();
            }
            VisibilityEvent::Intersection { intersecting } => {
                self.intersecting = intersecting;
                if self.trigger.on_intersection(intersecting, &page) {
                    self.fire(settled_tx);
                } else if intersecting {
                    self.counters.suppressed += 1;
                    trace!(state = ?self.trigger.state(), "intersection suppressed");
                }
            }
        }
        self.counters.events_seen += 1;
        self.publish();
    }

    fn on_filters_changed(&mut self, generation: u64) {
        debug!(generation, "filters changed, scroll trigger disarmed");
        self.trigger.session_reset();
        self.publish();
    }

    async fn on_listing_settled(
        &mut self,
        first_page: bool,
        settled_tx: &mpsc::UnboundedSender<Settled>,
    ) {
        if self.trigger.state() == TriggerState::Firing {
            return;
        }
        let page = self.listing.page_state().await;
        if first_page {
            self.trigger.first_page_settled(&page);
        } else {
            self.trigger.observe(&page);
        }
        self.refire_if_visible(&page, settled_tx);
        self.publish();
    }

    async fn on_fetch_settled(
        &mut self,
        outcome: Settled,
        settled_tx: &mpsc::UnboundedSender<Settled>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let page = self.listing.page_state().await;
        self.trigger.on_fetch_settled(&page);
        match outcome {
            Some(outcome) => {
                self.counters.fired += 1;
                debug!(page = outcome.page(), "scroll fetch settled");
                self.refire_if_visible(&page, settled_tx);
            }
            // Refused advances wait for the next visibility or listing event.
            None => {
                self.counters.suppressed += 1;
                debug!("listing refused the scroll advance");
            }
        }
        self.publish();
    }

    fn refire_if_visible(&mut self, page: &PageState, settled_tx: &mpsc::UnboundedSender<Settled>) {
        if self.intersecting && self.trigger.on_intersection(true, page) {
            self.fire(settled_tx);
        }
    }

    fn fire(&mut self, settled_tx: &mpsc::UnboundedSender<Settled>) {
        self.in_flight += 1;
        let listing = Arc::clone(&self.listing);
        let settled_tx = settled_tx.clone();
        tokio::spawn(async move {
            let outcome = listing.load_next_page().await;
            let _ = settled_tx.send(outcome);
        });
    }

    fn publish(&mut self) {
        self.counters.state = self.trigger.state();
        self.counters.fetching = self.in_flight > 0;
        self.status.send_replace(self.counters);
    }
}

#[cfg(test)]
#[path = "tests/scroll_tests.rs"]
mod tests;
