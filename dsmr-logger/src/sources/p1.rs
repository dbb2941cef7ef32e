use crc::{Crc, CRC_16_ARC};
use dsmr_client::{Decimal3, MeterReading};
use time::OffsetDateTime;

use super::{ParseError, TelegramDecoder};

/// DSMR 4/5 telegrams are protected by CRC16/ARC over `/` through `!`.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

const EDT1: &str = "1-0:1.8.1";
const EDT2: &str = "1-0:1.8.2";
const ERT1: &str = "1-0:2.8.1";
const ERT2: &str = "1-0:2.8.2";

/// Minimal P1 decoder: checksum plus the OBIS objects the logger uses.
/// Unknown objects are ignored.
pub struct P1Decoder {
    require_crc: bool,
}

impl P1Decoder {
    pub fn new(require_crc: bool) -> Self {
        Self { require_crc }
    }

    fn verify_checksum(&self, frame: &str, trailer: &str) -> Result<(), ParseError> {
        if trailer.is_empty() {
            return if self.require_crc {
                Err(ParseError::MissingChecksum)
            } else {
                Ok(())
            };
        }
        let expected = u16::from_str_radix(trailer, 16)
            .map_err(|_| ParseError::Malformed(format!("bad checksum '{trailer}'")))?;
        let computed = CRC16.checksum(frame.as_bytes());
        if expected != computed {
            return Err(ParseError::Checksum { expected, computed });
        }
        Ok(())
    }
}

/// `(a)(b*kWh)` -> `["a", "b*kWh"]`
fn groups(s: &str) -> Vec<&str> {
    s.split('(')
        .skip(1)
        .filter_map(|g| g.split_once(')').map(|(v, _)| v))
        .collect()
}

fn without_unit(value: &str) -> &str {
    value.split_once('*').map_or(value, |(v, _)| v)
}

fn decimal(obis: &str, value: &str) -> Result<Decimal3, ParseError> {
    without_unit(value)
        .parse()
        .map_err(|_| ParseError::Malformed(format!("{obis}: bad value '{value}'")))
}

fn count(obis: &str, value: &str) -> Result<u32, ParseError> {
    without_unit(value)
        .parse()
        .map_err(|_| ParseError::Malformed(format!("{obis}: bad counter '{value}'")))
}

// Per-phase objects, L1..L3.
const VOLTAGE: [&str; 3] = ["1-0:32.7.0", "1-0:52.7.0", "1-0:72.7.0"];
const CURRENT: [&str; 3] = ["1-0:31.7.0", "1-0:51.7.0", "1-0:71.7.0"];
const SAGS: [&str; 3] = ["1-0:32.32.0", "1-0:52.32.0", "1-0:72.32.0"];
const SWELLS: [&str; 3] = ["1-0:32.36.0", "1-0:52.36.0", "1-0:72.36.0"];

fn phase(table: &[&str; 3], obis: &str) -> Option<usize> {
    table.iter().position(|o| *o == obis)
}

impl TelegramDecoder for P1Decoder {
    fn decode(&self, raw: &[u8], received_at: OffsetDateTime) -> Result<MeterReading, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|e| ParseError::Malformed(e.to_string()))?;
        let start = text
            .find('/')
            .ok_or_else(|| ParseError::Malformed("no start of telegram".to_string()))?;
        let end = text[start..]
            .find('!')
            .map(|i| start + i)
            .ok_or_else(|| ParseError::Malformed("no end of telegram".to_string()))?;

        let frame = &text[start..=end];
        let trailer = text[end + 1..].lines().next().unwrap_or("").trim();
        self.verify_checksum(frame, trailer)?;

        let mut reading = MeterReading::empty(received_at);
        let mut mandatory = [false; 4];

        for line in frame.lines().map(str::trim) {
            let Some(open) = line.find('(') else {
                continue;
            };
            let obis = &line[..open];
            let values = groups(&line[open..]);
            let Some(first) = values.first().copied() else {
                continue;
            };

            match obis {
                EDT1 => {
                    reading.energy_delivered_tariff1 = decimal(obis, first)?;
                    mandatory[0] = true;
                }
                EDT2 => {
                    reading.energy_delivered_tariff2 = decimal(obis, first)?;
                    mandatory[1] = true;
                }
                ERT1 => {
                    reading.energy_returned_tariff1 = decimal(obis, first)?;
                    mandatory[2] = true;
                }
                ERT2 => {
                    reading.energy_returned_tariff2 = decimal(obis, first)?;
                    mandatory[3] = true;
                }
                "1-0:1.7.0" => reading.power_delivered = Some(decimal(obis, first)?),
                "1-0:2.7.0" => reading.power_returned = Some(decimal(obis, first)?),
                "0-0:96.7.21" => reading.electricity_failures = Some(count(obis, first)?),
                "0-0:96.7.9" => reading.electricity_long_failures = Some(count(obis, first)?),
                "0-0:1.0.0" => reading.meter_timestamp = Some(first.to_string()),
                "0-0:96.1.1" => reading.equipment_id = Some(first.to_string()),
                _ if obis.starts_with("0-") && obis.ends_with(":24.2.1") => {
                    // (capture time)(value*m3): the value is the last group.
                    let last = values.last().copied().unwrap_or(first);
                    reading.gas_delivered = Some(decimal(obis, last)?);
                }
                _ => {
                    if let Some(i) = phase(&VOLTAGE, obis) {
                        reading.voltage[i] = Some(decimal(obis, first)?);
                    } else if let Some(i) = phase(&CURRENT, obis) {
                        reading.current[i] = Some(decimal(obis, first)?);
                    } else if let Some(i) = phase(&SAGS, obis) {
                        reading.sags[i] = Some(count(obis, first)?);
                    } else if let Some(i) = phase(&SWELLS, obis) {
                        reading.swells[i] = Some(count(obis, first)?);
                    }
                }
            }
        }

        for (seen, name) in mandatory.iter().zip([EDT1, EDT2, ERT1, ERT2]) {
            if !seen {
                return Err(ParseError::MissingField(name));
            }
        }

        reading.valid = true;
        Ok(reading)
    }
}
