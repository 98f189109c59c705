//! Vote tally and ranking engine for the awards dashboard.
//!
//! A [`tasks::refresh::RefreshScheduler`] pulls votes and reference data from a
//! [`source::VoteSource`], and a [`service::DashboardService`] turns each pull
//! into category standings, trend series and voter demographics that every
//! dashboard view reads from.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod source;
pub mod store;
pub mod tally;
pub mod tasks;

pub use error::{SourceError, TallyError};
pub use service::{DashboardService, RefreshEvent, SubscriptionHandle};
pub use tasks::refresh::{CycleState, RefreshScheduler};
