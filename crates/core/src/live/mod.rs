//! Live queries.
//!
//! Writers report the tables (and rate pairs) touched by each committed write
//! unit through [`LiveQueryBus::publish`]. Every subscription declares the
//! [`Interest`] it was opened with; the bus wakes exactly the subscriptions
//! whose interest intersects the change, and each one re-runs its query on the
//! blocking pool and publishes a full snapshot.

mod bus;
mod table_change;

pub use bus::{best_effort, LiveQuery, LiveQueryBus};
pub use table_change::{Interest, Table, TableChange};
