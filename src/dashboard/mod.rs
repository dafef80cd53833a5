//! Loopback HTTP dashboard: JSON views over the event log and config, a
//! live event stream, dry runs and real triggers.

pub mod events;
mod routes;
pub mod server;
pub mod views;

pub use server::{build_router, serve, DashboardState};
