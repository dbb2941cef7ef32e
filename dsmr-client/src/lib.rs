pub mod domain;
pub mod ring_file;

pub use domain::{Decimal3, Granularity, MeterReading, SlotDelta, SlotRecord};
