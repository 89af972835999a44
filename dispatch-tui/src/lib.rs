//! Terminal dispatch board for field-service jobs.
//!
//! The engine modules ([`timeline`], [`availability`], [`markers`],
//! [`queue`]) are pure functions over fetched jobs and the current
//! [`app::DispatchView`]; [`api`] and [`geocode`] do the I/O.

pub mod api;
pub mod app;
pub mod availability;
pub mod config;
pub mod error;
pub mod geocode;
pub mod markers;
pub mod models;
pub mod queue;
pub mod schedule;
pub mod theme;
pub mod timeline;
pub mod ui;
