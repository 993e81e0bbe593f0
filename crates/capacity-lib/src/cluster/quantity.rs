//! Parsing of Kubernetes resource quantity strings
//!
//! Supports plain and fractional numbers with binary (`Ki`..`Ei`),
//! decimal (`n`..`E`) and exponent (`1e3`) suffixes. Parsing is exact:
//! the mantissa is kept as an integer and scaled, never routed through
//! floating point.

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("", 0),
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Parse a quantity such as `"96"`, `"500m"`, `"768Gi"` or `"25G"` into
/// whole base units.
///
/// Fractions round up, so `"500m"` is 1 and `"2.2"` is 3. Values beyond the
/// `i64` range saturate. Returns `None` for malformed input.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, unsigned) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let split = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let (exp10, exp2) = exponents(suffix)?;
    let scale = i32::try_from(fraction.len()).ok()?;
    let power = exp10.checked_sub(scale)?;

    let magnitude = digits(whole)
        .zip(Some(fraction))
        .and_then(|(mantissa, fraction)| {
            fraction.bytes().try_fold(mantissa, |acc, digit| {
                acc.checked_mul(10)?.checked_add(i128::from(digit - b'0'))
            })
        })
        .and_then(|mantissa| mantissa.checked_mul(1i128 << exp2))
        .and_then(|numerator| scale_by_power_of_ten(numerator, power, !negative));

    let value = match magnitude {
        Some(magnitude) if negative => -magnitude,
        Some(magnitude) => magnitude,
        None if negative => i128::from(i64::MIN),
        None => i128::from(i64::MAX),
    };
    Some(value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
}

fn digits(raw: &str) -> Option<i128> {
    raw.bytes().try_fold(0i128, |acc, digit| {
        acc.checked_mul(10)?.checked_add(i128::from(digit - b'0'))
    })
}

/// `numerator * 10^power`, rounding a fractional result up or down
fn scale_by_power_of_ten(numerator: i128, power: i32, round_up: bool) -> Option<i128> {
    if power >= 0 {
        return 10i128
            .checked_pow(power.unsigned_abs())
            .and_then(|factor| numerator.checked_mul(factor));
    }

    match 10i128.checked_pow(power.unsigned_abs()) {
        Some(divisor) => {
            let quotient = numerator / divisor;
            Some(quotient + i128::from(round_up && numerator % divisor != 0))
        }
        // Divisor beyond i128 means the value is below one unit
        None => Some(i128::from(round_up && numerator != 0)),
    }
}

fn exponents(suffix: &str) -> Option<(i32, u32)> {
    if let Some((_, exp2)) = BINARY_SUFFIXES.iter().find(|(name, _)| *name == suffix) {
        return Some((0, *exp2));
    }
    if let Some((_, exp10)) = DECIMAL_SUFFIXES.iter().find(|(name, _)| *name == suffix) {
        return Some((*exp10, 0));
    }
    let exponent = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    Some((exponent.parse::<i32>().ok()?, 0))
}
