pub mod decimal;
pub mod granularity;
pub mod meter_reading;
pub mod slot_record;

pub use decimal::{Decimal3, ParseDecimalError};
pub use granularity::Granularity;
pub use meter_reading::MeterReading;
pub use slot_record::{SlotDelta, SlotRecord};
