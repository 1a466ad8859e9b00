//! Next-departure board for a transit stop.
//!
//! Joins a GTFS Realtime trip-update feed with static GTFS tables and serves
//! the upcoming departures for a configured stop as JSON.

pub mod cache;
pub mod config;
pub mod departures;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod reference;
pub mod server;
pub mod service;
pub mod stops;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
