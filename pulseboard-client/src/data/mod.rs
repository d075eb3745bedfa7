//! Subscriber-side dashboard data.

mod history;
mod state;
mod status;

pub use history::{DataPoint, History, DEFAULT_HISTORY_SIZE};
pub use state::DashboardState;
pub use status::MetricStatus;
