use crate::error::ConversionError;
use std::time::Duration;

const INFINITE: &str = "infinite";

/// Parses a duration such as `30s`, `1.5h` or `250` (milliseconds).
///
/// `infinite` yields `Duration::MAX` when `allow_infinite` is set.
///
/// # Errors
/// Returns a `ConversionError` for unknown units, negative or malformed
/// numbers, overflow, or `infinite` when it is not allowed.
pub fn parse_duration(text: &str, allow_infinite: bool) -> Result<Duration, ConversionError> {
    let text = text.trim();
    if text == INFINITE {
        return if allow_infinite {
            Ok(Duration::MAX)
        } else {
            Err(ConversionError::InfiniteDuration)
        };
    }

    let invalid = || ConversionError::mismatch("a duration", format!("`{text}`"));
    let (number, unit) = split_number_and_unit(text);
    let nanos_per_unit = duration_unit(unit).ok_or_else(invalid)?;
    let nanos = scale_decimal(number, nanos_per_unit).ok_or_else(invalid)?;

    let secs = u64::try_from(nanos / 1_000_000_000).map_err(|_| invalid())?;
    // The remainder is below one billion and always fits.
    let subsec = (nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, subsec))
}

/// Parses a byte size such as `512MiB`, `10 kB` or `4096` (bytes).
///
/// # Errors
/// Returns a `ConversionError` for unknown units, negative or malformed
/// numbers, or a magnitude beyond `i128`.
pub fn parse_byte_size(text: &str) -> Result<i128, ConversionError> {
    let text = text.trim();
    let invalid = || ConversionError::mismatch("a byte size", format!("`{text}`"));
    let (number, unit) = split_number_and_unit(text);
    let bytes_per_unit = byte_unit(unit).ok_or_else(invalid)?;
    let bytes = scale_decimal(number, bytes_per_unit).ok_or_else(invalid)?;
    i128::try_from(bytes).map_err(|_| invalid())
}

fn split_number_and_unit(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+'))
        .unwrap_or(text.len());
    (&text[..end], text[end..].trim())
}

/// Multiplies a non-negative decimal literal by `factor`, truncating any
/// fraction that remains. Returns `None` on malformed input or overflow.
fn scale_decimal(number: &str, factor: u128) -> Option<u128> {
    let number = number.strip_prefix('+').unwrap_or(number);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let digits = format!("{whole}{fraction}");
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mantissa: u128 = digits.parse().ok()?;
    let divisor = 10u128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
    Some(mantissa.checked_mul(factor)? / divisor)
}

fn duration_unit(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => 1,
        "us" | "micro" | "micros" | "microsecond" | "microseconds" => 1_000,
        "" | "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1_000_000,
        "s" | "second" | "seconds" => 1_000_000_000,
        "m" | "minute" | "minutes" => 60 * 1_000_000_000,
        "h" | "hour" | "hours" => 3_600 * 1_000_000_000,
        "d" | "day" | "days" => 86_400 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

// (SI suffix, SI name, binary letter, binary name stem)
const BYTE_PREFIXES: [(&str, &str, char, &str); 8] = [
    ("kB", "kilo", 'K', "kibi"),
    ("MB", "mega", 'M', "mebi"),
    ("GB", "giga", 'G', "gibi"),
    ("TB", "tera", 'T', "tebi"),
    ("PB", "peta", 'P', "pebi"),
    ("EB", "exa", 'E', "exbi"),
    ("ZB", "zetta", 'Z', "zebi"),
    ("YB", "yotta", 'Y', "yobi"),
];

fn byte_unit(unit: &str) -> Option<u128> {
    if matches!(unit, "" | "B" | "b" | "byte" | "bytes") {
        return Some(1);
    }

    let named = |stem: &str| {
        unit.strip_prefix(stem)
            .is_some_and(|rest| rest == "byte" || rest == "bytes")
    };

    for (power, (si, si_stem, letter, binary_stem)) in (1u32..).zip(BYTE_PREFIXES) {
        if unit == si || named(si_stem) {
            return Some(1000u128.pow(power));
        }
        let lower = letter.to_ascii_lowercase();
        let mut chars = unit.chars();
        let binary_short = match (chars.next(), chars.as_str()) {
            (Some(c), rest) if c == letter || c == lower => rest.is_empty(),
            _ => false,
        } || unit == format!("{letter}i")
            || unit == format!("{letter}iB");
        if binary_short || named(binary_stem) {
            return Some(1024u128.pow(power));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_units() {
        assert_eq!(parse_duration("10s", true).unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250", true).unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3 minutes", true).unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1.5h", true).unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("7us", true).unwrap(), Duration::from_micros(7));
        assert_eq!(parse_duration("2d", true).unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_duration_round_trip() {
        for millis in [0u64, 1, 999, 60_000, 86_400_000] {
            let text = format!("{millis}ms");
            assert_eq!(
                parse_duration(&text, false).unwrap(),
                Duration::from_millis(millis)
            );
        }
    }

    #[test]
    fn test_infinite_duration() {
        assert_eq!(parse_duration("infinite", true).unwrap(), Duration::MAX);
        assert_eq!(
            parse_duration("infinite", false).unwrap_err(),
            ConversionError::InfiniteDuration
        );
    }

    #[test]
    fn test_invalid_durations() {
        assert!(parse_duration("10 fortnights", true).is_err());
        assert!(parse_duration("-5s", true).is_err());
        assert!(parse_duration("s", true).is_err());
    }

    #[test]
    fn test_byte_sizes() {
        assert_eq!(parse_byte_size("4096").unwrap(), 4096);
        assert_eq!(parse_byte_size("10kB").unwrap(), 10_000);
        assert_eq!(parse_byte_size("10K").unwrap(), 10_240);
        assert_eq!(parse_byte_size("1 MiB").unwrap(), 1_048_576);
        assert_eq!(parse_byte_size("2 megabytes").unwrap(), 2_000_000);
        assert_eq!(parse_byte_size("1gibibyte").unwrap(), 1 << 30);
        assert_eq!(parse_byte_size("1.5k").unwrap(), 1536);
        assert_eq!(parse_byte_size("0").unwrap(), 0);
    }

    #[test]
    fn test_byte_size_round_trip() {
        let units = [("KiB", 1024i128), ("MB", 1_000_000), ("Gi", 1 << 30), ("YiB", 1 << 80)];
        for (unit, factor) in units {
            for magnitude in [1i128, 7, 1000] {
                let text = format!("{magnitude}{unit}");
                assert_eq!(parse_byte_size(&text).unwrap(), magnitude * factor);
            }
        }
    }

    #[test]
    fn test_invalid_byte_sizes() {
        assert!(parse_byte_size("12 parsecs").is_err());
        assert!(parse_byte_size("-1").is_err());
        assert!(parse_byte_size("").is_err());
    }
}
