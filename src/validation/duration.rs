//! Duration strings such as `"1h30m"`, `"90s"` or `"1.5h"`.
//!
//! Accepts a sequence of decimal numbers, each with an optional fraction and a
//! mandatory unit suffix (`ns`, `us`, `µs`, `μs`, `ms`, `s`, `m`, `h`). The bare
//! string `"0"` is the only unitless value allowed.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Largest representable duration, matching a signed 64-bit nanosecond count.
const MAX_NANOS: u128 = i64::MAX as u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration")]
    Invalid,
    #[error("negative duration")]
    Negative,
}

/// Parse a duration string.
///
/// A leading `-` yields [`DurationError::Negative`] for any non-zero value; `+` is ignored.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let (negative, rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationError::Invalid);
    }

    let mut total: u128 = 0;
    let mut remaining = rest;

    while !remaining.is_empty() {
        let (whole, fraction, after_number) = take_number(remaining)?;
        let (unit_nanos, after_unit) = take_unit(after_number)?;

        let mut value = whole.checked_mul(unit_nanos).ok_or(DurationError::Invalid)?;
        if let Some((digits, scale)) = fraction {
            // Truncate toward zero, as integer nanoseconds cannot carry the remainder.
            value += digits * unit_nanos / scale;
        }

        total = total.checked_add(value).ok_or(DurationError::Invalid)?;
        if total > MAX_NANOS {
            return Err(DurationError::Invalid);
        }
        remaining = after_unit;
    }

    if negative && total > 0 {
        return Err(DurationError::Negative);
    }

    let secs = (total / NANOS_PER_SECOND) as u64;
    let nanos = (total % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Consume `digits[.digits]`, returning the whole part, an optional `(fraction, 10^len)`
/// pair and the unparsed tail.
#[allow(clippy::type_complexity)]
fn take_number(input: &str) -> Result<(u128, Option<(u128, u128)>, &str), DurationError> {
    let whole_len = input.bytes().take_while(u8::is_ascii_digit).count();
    let whole = parse_digits(&input[..whole_len])?;
    let mut rest = &input[whole_len..];

    let mut fraction = None;
    let mut fraction_len = 0;
    if let Some(after_dot) = rest.strip_prefix('.') {
        fraction_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
        // Digits beyond the 18th are below nanosecond precision for every unit.
        let kept = fraction_len.min(18);
        let digits = parse_digits(&after_dot[..kept])?;
        fraction = Some((digits, 10u128.pow(kept as u32)));
        rest = &after_dot[fraction_len..];
    }

    if whole_len == 0 && fraction_len == 0 {
        return Err(DurationError::Invalid);
    }

    Ok((whole, fraction, rest))
}

fn parse_digits(digits: &str) -> Result<u128, DurationError> {
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<u128>().map_err(|_| DurationError::Invalid)
}

fn take_unit(input: &str) -> Result<(u128, &str), DurationError> {
    let unit_len = input
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(idx, _)| idx)
        .unwrap_or(input.len());

    let nanos = match &input[..unit_len] {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        "h" => 3_600 * NANOS_PER_SECOND,
        _ => return Err(DurationError::Invalid),
    };

    Ok((nanos, &input[unit_len..]))
}
