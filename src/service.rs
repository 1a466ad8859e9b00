//! Request-level departures operation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, warn};

use crate::cache::{Clock, ResultCache, SystemClock};
use crate::departures::{DepartureBoard, extract_departures};
use crate::error::{DepartureError, FeedError};
use crate::feed::FeedSource;
use crate::reference::ReferenceData;
use crate::stops::WatchedStops;

/// Default freshness window.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Serves departure boards for the watched stops, fetching the feed at most
/// once per freshness window.
pub struct DepartureService {
    reference: Arc<ReferenceData>,
    watched: Arc<WatchedStops>,
    source: Arc<dyn FeedSource>,
    cache: ResultCache<DepartureBoard, FeedError>,
}

impl DepartureService {
    pub fn new(
        reference: Arc<ReferenceData>,
        watched: Arc<WatchedStops>,
        source: Arc<dyn FeedSource>,
        ttl: Duration,
    ) -> Self {
        Self::with_clock(reference, watched, source, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        reference: Arc<ReferenceData>,
        watched: Arc<WatchedStops>,
        source: Arc<dyn FeedSource>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reference,
            watched,
            source,
            cache: ResultCache::new(ttl, clock),
        }
    }

    /// Current board for the watched stops.
    ///
    /// # Errors
    ///
    /// [`DepartureError::NoStopConfigured`] when nothing is watched, on every
    /// call. [`DepartureError::FeedUnavailable`] when a needed refresh fails;
    /// the previously cached board is kept for later requests.
    pub async fn departures(&self) -> Result<Arc<DepartureBoard>, DepartureError> {
        if self.watched.is_empty() {
            return Err(DepartureError::NoStopConfigured {
                label: self.watched.label().to_string(),
            });
        }

        self.cache
            .get_or_refresh(|| self.refresh())
            .await
            .map_err(|e| {
                warn!(error = %e, "Departure refresh failed");
                DepartureError::FeedUnavailable(e)
            })
    }

    #[tracing::instrument(skip(self))]
    async fn refresh(&self) -> Result<DepartureBoard, FeedError> {
        let feed = self.source.fetch_feed().await?;
        let extraction = extract_departures(&feed.entity, &self.watched, &self.reference, &Local);
        let stats = extraction.stats;
        debug!(
            entities = stats.entities,
            trip_updates = stats.trip_updates,
            stop_updates = stats.stop_updates,
            watched_updates = stats.watched_updates,
            without_time = stats.without_time,
            departures = extraction.board.departures.len(),
            "Departures extracted"
        );
        Ok(extraction.board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
    use crate::gtfs_rt::{FeedEntity, FeedMessage, TripDescriptor, TripUpdate};
    use crate::reference::{RouteNames, StopDirectory, StopInfo, TripRoutes};
    use crate::stops::StopSelector;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out queued results, one per fetch.
    #[derive(Default)]
    struct Scripted {
        results: Mutex<VecDeque<Result<FeedMessage, FeedError>>>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn push(&self, result: Result<FeedMessage, FeedError>) {
            self.results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl FeedSource for Scripted {
        async fn fetch_feed(&self) -> Result<FeedMessage, FeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FeedError::Status { status: 500 }))
        }
    }

    fn reference() -> Arc<ReferenceData> {
        Arc::new(ReferenceData {
            routes: [("R1".to_string(), "42".to_string())]
                .into_iter()
                .collect::<RouteNames>(),
            trips: [("T1".to_string(), "R1".to_string())]
                .into_iter()
                .collect::<TripRoutes>(),
            stops: [("S1".to_string(), StopInfo::new("Central Station", Some("2")))]
                .into_iter()
                .collect::<StopDirectory>(),
        })
    }

    fn feed_at(hh: u32, mm: u32) -> FeedMessage {
        let time = Local
            .with_ymd_and_hms(2025, 3, 14, hh, mm, 0)
            .single()
            .unwrap()
            .timestamp();
        FeedMessage {
            entity: vec![FeedEntity {
                id: "e1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("T1".to_string()),
                        ..Default::default()
                    },
                    stop_time_update: vec![StopTimeUpdate {
                        stop_id: Some("S1".to_string()),
                        departure: Some(StopTimeEvent {
                            time: Some(time),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn service(
        selector: StopSelector,
        source: Arc<Scripted>,
    ) -> (DepartureService, Arc<ManualClock>) {
        let reference = reference();
        let watched = Arc::new(WatchedStops::resolve(&selector, &reference.stops));
        let clock = Arc::new(ManualClock::new());
        let service =
            DepartureService::with_clock(reference, watched, source, CACHE_TTL, clock.clone());
        (service, clock)
    }

    #[tokio::test]
    async fn test_departures_end_to_end() {
        let source = Arc::new(Scripted::default());
        source.push(Ok(feed_at(8, 7)));
        let (service, _clock) = service(StopSelector::Id("S1".to_string()), source.clone());

        let board = service.departures().await.unwrap();

        assert_eq!(board.stop_display_name, "Central Station platform 2");
        assert_eq!(board.departures.len(), 1);
        assert_eq!(board.departures[0].route, "42");
        assert_eq!(board.departures[0].time, "08:07");
        assert_eq!(board.departures[0].platform, "2");
    }

    #[tokio::test]
    async fn test_unconfigured_stop_is_an_error_without_fetching() {
        let source = Arc::new(Scripted::default());
        let (service, _clock) = service(StopSelector::Unconfigured, source.clone());

        for _ in 0..2 {
            let err = service.departures().await.unwrap_err();
            assert_eq!(err.kind(), "config_error");
            assert_eq!(err.to_string(), "No stop configured");
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_name_without_matches_is_a_config_error() {
        let source = Arc::new(Scripted::default());
        source.push(Ok(feed_at(8, 7)));
        let (service, _clock) = service(
            StopSelector::NameContains("Airport".to_string()),
            source.clone(),
        );

        let err = service.departures().await.unwrap_err();
        assert_eq!(err.kind(), "config_error");
        assert_eq!(err.to_string(), "No stops found for \"Airport\"");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_during_outage_fetch_once() {
        let source = Arc::new(Scripted {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let (service, _clock) = service(StopSelector::Id("S1".to_string()), source.clone());

        let (a, b, c) = tokio::join!(
            service.departures(),
            service.departures(),
            service.departures()
        );

        for result in [a, b, c] {
            assert_eq!(result.unwrap_err().kind(), "feed_unavailable");
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_requests_within_window_fetch_once() {
        let source = Arc::new(Scripted::default());
        source.push(Ok(feed_at(8, 7)));
        let (service, clock) = service(StopSelector::Id("S1".to_string()), source.clone());

        let first = service.departures().await.unwrap();
        clock.advance(Duration::from_secs(10));
        let second = service.departures().await.unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_vec(&*first).unwrap(),
            serde_json::to_vec(&*second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_cache() {
        let source = Arc::new(Scripted::default());
        source.push(Err(FeedError::Status { status: 503 }));
        source.push(Ok(feed_at(9, 15)));
        let (service, clock) = service(StopSelector::Id("S1".to_string()), source.clone());

        let err = service.departures().await.unwrap_err();
        assert_eq!(err.kind(), "feed_unavailable");

        let good = service.departures().await.unwrap();
        assert_eq!(good.departures[0].time, "09:15");

        // next upstream call would fail, but the window still covers us
        clock.advance(Duration::from_secs(20));
        let cached = service.departures().await.unwrap();
        assert!(Arc::ptr_eq(&good, &cached));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        // stale: refresh fails, error reported, cached board kept
        clock.advance(Duration::from_secs(20));
        assert!(service.departures().await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
