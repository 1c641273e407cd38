//! Derived statistics over a user's daily log. Pure functions only; callers
//! load entries and pass them in.

pub mod engine;
pub mod projection;

pub use engine::{compute, CalculatedMetrics, DayLog};
pub use projection::Projection;
