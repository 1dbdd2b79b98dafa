// src/capacity/mod.rs

pub mod converter;
pub mod schedule;

pub use converter::{Converter, FeedConverter, SwuConverter};
pub use schedule::CapacitySchedule;
