//! Geocoding client for skycast.
//!
//! Wraps a Nominatim-style service: forward search by free text (single
//! and multi-result) and reverse lookup by coordinates, normalized into
//! [`Place`](skycast_core::Place) values with short, disambiguated
//! display names.

pub mod client;
pub mod error;

pub use client::GeocodeClient;
pub use error::GeocodeError;
