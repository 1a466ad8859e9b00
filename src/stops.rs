//! Resolves the configured stop selector into the set of watched stop ids.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::reference::StopDirectory;

/// How the deployment picks the stops it reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopSelector {
    /// A single stop id
    Id(String),
    /// Every stop whose name contains this text, ignoring case
    NameContains(String),
    /// Nothing configured
    Unconfigured,
}

impl StopSelector {
    /// Builds a selector from optional settings. Blank values count as absent
    /// and an explicit id wins over a name.
    pub fn from_options(stop_id: Option<&str>, stop_name: Option<&str>) -> Self {
        match (non_blank(stop_id), non_blank(stop_name)) {
            (Some(id), _) => StopSelector::Id(id.to_string()),
            (None, Some(name)) => StopSelector::NameContains(name.to_string()),
            (None, None) => StopSelector::Unconfigured,
        }
    }
}

/// Trimmed setting value, or `None` when it is absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The stops this process reports departures for, and the label shown with
/// them. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedStops {
    stop_ids: HashSet<String>,
    label: String,
}

impl WatchedStops {
    pub fn new(stop_ids: impl IntoIterator<Item = String>, label: impl Into<String>) -> Self {
        Self {
            stop_ids: stop_ids.into_iter().collect(),
            label: label.into(),
        }
    }

    /// Resolves `selector` against the stop directory.
    pub fn resolve(selector: &StopSelector, stops: &StopDirectory) -> Self {
        let watched = match selector {
            StopSelector::Id(id) => Self::new([id.clone()], stops.display_label(id)),
            StopSelector::NameContains(query) => {
                let matches = stops.search(query);
                let label = match matches.as_slice() {
                    [] => format!("No stops found for \"{query}\""),
                    [(_, stop)] => stop.display_label(),
                    _ => query.clone(),
                };
                Self::new(matches.into_iter().map(|(id, _)| id.to_string()), label)
            }
            StopSelector::Unconfigured => Self::new([], "No stop configured"),
        };

        if watched.is_empty() {
            warn!(?selector, label = %watched.label, "No stops to watch");
        } else {
            info!(
                ?selector,
                stops = watched.stop_ids.len(),
                label = %watched.label,
                "Watching stops"
            );
        }
        watched
    }

    pub fn contains(&self, stop_id: &str) -> bool {
        self.stop_ids.contains(stop_id)
    }

    pub fn is_empty(&self) -> bool {
        self.stop_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stop_ids.len()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
