pub mod p1;
pub mod telegram_file;

pub use p1::P1Decoder;
pub use telegram_file::FileTelegramSource;

use dsmr_client::MeterReading;
use time::OffsetDateTime;

use crate::state::LoggerState;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("no telegram received")]
    NoData,
    #[error("telegram source failed: {0}")]
    Source(#[from] std::io::Error),
    #[error("malformed telegram: {0}")]
    Malformed(String),
    #[error("checksum mismatch: telegram says {expected:04X}, computed {computed:04X}")]
    Checksum { expected: u16, computed: u16 },
    #[error("telegram carries no checksum")]
    MissingChecksum,
    #[error("mandatory field {0} missing")]
    MissingField(&'static str),
}

/// Raw bytes from the metering port.
pub trait TelegramSource {
    /// `Ok(None)` when nothing new arrived since the previous call.
    fn read_telegram(&mut self) -> std::io::Result<Option<Vec<u8>>>;
}

/// Wire-format decode and checksum validation of one telegram.
pub trait TelegramDecoder {
    fn decode(&self, raw: &[u8], received_at: OffsetDateTime) -> Result<MeterReading, ParseError>;
}

pub struct TelegramIngest {
    source: Box<dyn TelegramSource>,
    decoder: Box<dyn TelegramDecoder>,
}

impl TelegramIngest {
    pub fn new(source: Box<dyn TelegramSource>, decoder: Box<dyn TelegramDecoder>) -> Self {
        Self { source, decoder }
    }

    pub fn ingest(&mut self, now: OffsetDateTime) -> Result<MeterReading, ParseError> {
        let raw = self.source.read_telegram()?.ok_or(ParseError::NoData)?;
        self.decoder.decode(&raw, now)
    }

    /// Ingest once and fold the outcome into `state`.
    ///
    /// A failure keeps the last good reading; it is only counted.
    pub fn poll(&mut self, state: &mut LoggerState, now: OffsetDateTime) -> bool {
        match self.ingest(now) {
            Ok(reading) => {
                state.counters.telegram_ok();
                tracing::debug!(
                    edt1 = %reading.energy_delivered_tariff1,
                    edt2 = %reading.energy_delivered_tariff2,
                    "telegram ingested"
                );
                state.accept(reading);
                true
            }
            Err(e) => {
                state.counters.telegram_error();
                tracing::warn!(error = %e, errors = state.counters.telegram_errors, "telegram rejected");
                false
            }
        }
    }
}
