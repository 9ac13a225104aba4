//! Background tasks.

mod sweeper;

pub use sweeper::{SweepReport, SweeperTask};
