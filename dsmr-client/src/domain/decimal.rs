use std::{fmt, ops::Sub, str::FromStr};

/// Fixed-precision decimal with three fractional digits, stored as thousandths.
///
/// Meter counters are published with at most three decimals, so keeping them
/// as integers makes a value survive the ring-file text format unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal3(i64);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid decimal '{0}'")]
pub struct ParseDecimalError(String);

impl Decimal3 {
    pub const ZERO: Decimal3 = Decimal3(0);

    pub const fn from_thousandths(value: i64) -> Self {
        Self(value)
    }

    pub const fn thousandths(self) -> i64 {
        self.0
    }

    pub fn from_f64(value: f64) -> Self {
        Self((value * 1000.0).round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Decimal3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        // `pad` so callers can use width/alignment like `{:>10}`.
        f.pad(&format!("{sign}{}.{:03}", abs / 1000, abs % 1000))
    }
}

impl FromStr for Decimal3 {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if frac_part.len() > 3
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let mut value: i64 = 0;
        for b in int_part.bytes() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(b - b'0')))
                .ok_or_else(err)?;
        }

        let mut frac: i64 = 0;
        for i in 0..3 {
            let digit = frac_part.as_bytes().get(i).map_or(0, |b| i64::from(b - b'0'));
            frac = frac * 10 + digit;
        }

        let thousandths = value
            .checked_mul(1000)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(err)?;

        Ok(Self(if negative { -thousandths } else { thousandths }))
    }
}

impl Sub for Decimal3 {
    type Output = Decimal3;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Decimal3 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Decimal3 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = <f64 as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self::from_f64(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meter_style_values() {
        assert_eq!("001234.567".parse::<Decimal3>().unwrap().thousandths(), 1_234_567);
        assert_eq!("  78.9".parse::<Decimal3>().unwrap().thousandths(), 78_900);
        assert_eq!("230".parse::<Decimal3>().unwrap().thousandths(), 230_000);
        assert_eq!("-0.5".parse::<Decimal3>().unwrap().thousandths(), -500);
    }

    #[test]
    fn rejects_garbage_and_excess_precision() {
        assert!("".parse::<Decimal3>().is_err());
        assert!("1.2345".parse::<Decimal3>().is_err());
        assert!("12a.0".parse::<Decimal3>().is_err());
        assert!(".".parse::<Decimal3>().is_err());
    }

    #[test]
    fn displays_three_decimals_and_honours_width() {
        let d = Decimal3::from_thousandths(45_120);
        assert_eq!(d.to_string(), "45.120");
        assert_eq!(format!("{d:>10}"), "    45.120");
        assert_eq!(Decimal3::from_thousandths(-7).to_string(), "-0.007");
    }
}
