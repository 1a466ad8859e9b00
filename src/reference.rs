//! Static GTFS reference tables.
//!
//! Loads `routes.txt`, `trips.txt` and `stops.txt` once at startup into
//! immutable lookup maps. Lookups that miss are not errors: callers fall back
//! to [`UNKNOWN`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ReferenceDataError;

/// Marker rendered in place of a route name or platform that could not be
/// resolved.
pub const UNKNOWN: &str = "?";

#[derive(Debug, Deserialize)]
struct RouteRecord {
    route_id: String,
    #[serde(default)]
    route_short_name: Option<String>,
    #[serde(default)]
    route_long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TripRecord {
    trip_id: String,
    route_id: String,
}

#[derive(Debug, Deserialize)]
struct StopRecord {
    stop_id: String,
    #[serde(default)]
    stop_name: Option<String>,
    #[serde(default)]
    platform_code: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

/// Route id → display name (short name, else long name).
#[derive(Debug, Default, Clone)]
pub struct RouteNames {
    names: HashMap<String, String>,
}

impl RouteNames {
    /// Parses a `routes.txt` table.
    ///
    /// Routes with neither a short nor a long name get no entry, so they
    /// resolve to [`UNKNOWN`] later.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut names = HashMap::new();
        for record in reader(rdr).deserialize() {
            let route: RouteRecord = record?;
            let display = non_blank(route.route_short_name).or(non_blank(route.route_long_name));
            match display {
                Some(display) => {
                    names.insert(route.route_id, display);
                }
                None => {
                    names.remove(&route.route_id);
                }
            }
        }
        Ok(Self { names })
    }

    pub fn get(&self, route_id: &str) -> Option<&str> {
        self.names.get(route_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for RouteNames {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Trip id → route id.
#[derive(Debug, Default, Clone)]
pub struct TripRoutes {
    routes: HashMap<String, String>,
}

impl TripRoutes {
    /// Parses a `trips.txt` table. Later rows win on duplicate trip ids.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut routes = HashMap::new();
        for record in reader(rdr).deserialize() {
            let trip: TripRecord = record?;
            routes.insert(trip.trip_id, trip.route_id);
        }
        Ok(Self { routes })
    }

    pub fn get(&self, trip_id: &str) -> Option<&str> {
        self.routes.get(trip_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<(String, String)> for TripRoutes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

/// Name and platform of a single stop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopInfo {
    pub name: Option<String>,
    pub platform: Option<String>,
}

impl StopInfo {
    pub fn new(name: impl Into<String>, platform: Option<&str>) -> Self {
        Self {
            name: Some(name.into()),
            platform: platform.map(str::to_string),
        }
    }

    /// Human-facing label, e.g. `Central Station platform 3`.
    pub fn display_label(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Unnamed stop");
        let platform = self.platform.as_deref().unwrap_or(UNKNOWN);
        format!("{name} platform {platform}")
    }
}

/// Stop id → [`StopInfo`].
#[derive(Debug, Default, Clone)]
pub struct StopDirectory {
    stops: HashMap<String, StopInfo>,
}

impl StopDirectory {
    /// Parses a `stops.txt` table.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut stops = HashMap::new();
        for record in reader(rdr).deserialize() {
            let stop: StopRecord = record?;
            stops.insert(
                stop.stop_id,
                StopInfo {
                    name: non_blank(stop.stop_name),
                    platform: non_blank(stop.platform_code),
                },
            );
        }
        Ok(Self { stops })
    }

    /// Platform code of a stop, if the stop is known and has one.
    pub fn platform(&self, stop_id: &str) -> Option<&str> {
        self.stops.get(stop_id)?.platform.as_deref()
    }

    /// Label for a single stop id, including ids missing from the directory.
    pub fn display_label(&self, stop_id: &str) -> String {
        match self.stops.get(stop_id) {
            Some(stop) => stop.display_label(),
            None => format!("Unknown stop ({stop_id})"),
        }
    }

    /// Stops whose name contains `query`, ignoring case. Sorted by stop id.
    pub fn search(&self, query: &str) -> Vec<(&str, &StopInfo)> {
        let needle = query.to_lowercase();
        let mut matches: Vec<_> = self
            .stops
            .iter()
            .filter(|(_, stop)| {
                stop.name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .map(|(id, stop)| (id.as_str(), stop))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        matches
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl FromIterator<(String, StopInfo)> for StopDirectory {
    fn from_iter<I: IntoIterator<Item = (String, StopInfo)>>(iter: I) -> Self {
        Self {
            stops: iter.into_iter().collect(),
        }
    }
}

/// All static reference tables, loaded once and shared read-only.
#[derive(Debug, Default, Clone)]
pub struct ReferenceData {
    pub routes: RouteNames,
    pub trips: TripRoutes,
    pub stops: StopDirectory,
}

impl ReferenceData {
    /// Loads `routes.txt`, `trips.txt` and `stops.txt` from `dir`.
    ///
    /// # Errors
    ///
    /// Fails on the first missing, unreadable or malformed table.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Result<Self, ReferenceDataError> {
        let routes = read_table(&dir.join("routes.txt"), RouteNames::from_reader)?;
        let trips = read_table(&dir.join("trips.txt"), TripRoutes::from_reader)?;
        let stops = read_table(&dir.join("stops.txt"), StopDirectory::from_reader)?;

        if routes.is_empty() || trips.is_empty() {
            warn!(
                routes = routes.len(),
                trips = trips.len(),
                "Reference tables are empty, every route will render as unknown"
            );
        }
        info!(
            routes = routes.len(),
            trips = trips.len(),
            stops = stops.len(),
            "Reference data loaded"
        );

        Ok(Self {
            routes,
            trips,
            stops,
        })
    }

    /// Display name of the route serving `trip_id`, or [`UNKNOWN`].
    pub fn route_name_for_trip(&self, trip_id: Option<&str>) -> &str {
        trip_id
            .and_then(|trip| self.trips.get(trip))
            .and_then(|route| self.routes.get(route))
            .unwrap_or(UNKNOWN)
    }

    /// Platform code for `stop_id`, or [`UNKNOWN`].
    pub fn platform_for_stop(&self, stop_id: &str) -> &str {
        self.stops.platform(stop_id).unwrap_or(UNKNOWN)
    }
}

fn read_table<T>(
    path: &Path,
    parse: impl FnOnce(File) -> Result<T, csv::Error>,
) -> Result<T, ReferenceDataError> {
    let file = File::open(path).map_err(|source| ReferenceDataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(file).map_err(|source| ReferenceDataError::Csv {
        path: path.to_path_buf(),
        source,
    })
}
