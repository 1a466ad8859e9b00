//! Turns decoded feed entities into the departure list for the watched stops.
//!
//! Pure: no I/O, all inputs are borrowed.

use std::fmt::Display;

use chrono::TimeZone;
use serde::Serialize;

use crate::gtfs_rt::FeedEntity;
use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use crate::reference::ReferenceData;
use crate::stops::WatchedStops;

/// One upcoming departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Departure {
    pub route: String,
    /// Zero-padded 24-hour `HH:MM`
    pub time: String,
    pub platform: String,
}

/// Departures for the watched stops plus the label shown above them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureBoard {
    pub stop_display_name: String,
    pub departures: Vec<Departure>,
}

/// Counters collected during one extraction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionStats {
    pub entities: usize,
    pub trip_updates: usize,
    pub stop_updates: usize,
    pub watched_updates: usize,
    pub without_time: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub board: DepartureBoard,
    pub stats: ExtractionStats,
}

/// Formats an epoch timestamp as `HH:MM` in `tz`. `None` if out of range.
pub fn format_clock_time<Tz>(epoch_secs: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    tz.timestamp_opt(epoch_secs, 0)
        .single()
        .map(|t| t.format("%H:%M").to_string())
}

fn event_time(event: Option<&StopTimeEvent>) -> Option<i64> {
    event.and_then(|e| e.time).filter(|&t| t != 0)
}

/// Departure time if present, else arrival time. Zero counts as unset.
pub fn effective_time(update: &StopTimeUpdate) -> Option<i64> {
    event_time(update.departure.as_ref()).or_else(|| event_time(update.arrival.as_ref()))
}

/// Builds the departure board for `watched` from `entities`.
///
/// Updates without a usable time are dropped. Route and platform lookups
/// that miss render as [`crate::reference::UNKNOWN`]. Identical rows are kept.
/// The result is sorted by the formatted time string, so the order is only
/// chronological within one day.
pub fn extract_departures<Tz>(
    entities: &[FeedEntity],
    watched: &WatchedStops,
    reference: &ReferenceData,
    tz: &Tz,
) -> Extraction
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut stats = ExtractionStats {
        entities: entities.len(),
        ..Default::default()
    };
    let mut departures = Vec::new();

    for trip_update in entities.iter().filter_map(|e| e.trip_update.as_ref()) {
        stats.trip_updates += 1;
        let route = reference.route_name_for_trip(trip_update.trip.trip_id.as_deref());

        for update in &trip_update.stop_time_update {
            stats.stop_updates += 1;
            let Some(stop_id) = update.stop_id.as_deref() else {
                continue;
            };
            if !watched.contains(stop_id) {
                continue;
            }
            stats.watched_updates += 1;

            let Some(time) = effective_time(update).and_then(|t| format_clock_time(t, tz)) else {
                stats.without_time += 1;
                continue;
            };

            departures.push(Departure {
                route: route.to_string(),
                time,
                platform: reference.platform_for_stop(stop_id).to_string(),
            });
        }
    }

    // stable: equal times keep feed order
    departures.sort_by(|a, b| a.time.cmp(&b.time));

    Extraction {
        board: DepartureBoard {
            stop_display_name: watched.label().to_string(),
            departures,
        },
        stats,
    }
}
