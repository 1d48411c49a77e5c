//! Data core for a two-country economic dashboard.
//!
//! Pipeline: raw delimited text ([`fetch`]) → typed records ([`parse`]) →
//! aligned time series ([`series`]) → derived metrics ([`derive`]) → fitted
//! trendlines ([`fit`]), assembled into one serializable payload by
//! [`dashboard`]. Everything below `fetch` is synchronous and pure; the
//! presentation layer is a separate consumer of the output structures.

pub mod dashboard;
pub mod derive;
pub mod fetch;
pub mod fit;
pub mod parse;
pub mod series;
