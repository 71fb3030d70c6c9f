//! Extended scalar literals: timestamps, durations, sizes, regexes.
//!
//! These are shape-validated at lex time and carried through the pipeline
//! as their original text, which is also their JSON string form. Regex
//! literals are never compiled here; they are data, not behavior.

/// `@YYYY-MM-DDThh:mm:ss[.fff][Z|±hh:mm]` (leading `@` included).
pub fn is_timestamp(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('@') else {
        return false;
    };
    let b = rest.as_bytes();
    // Fixed prefix: YYYY-MM-DDThh:mm:ss
    if b.len() < 19 {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(|c| c.is_ascii_digit());
    if !(digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19))
    {
        return false;
    }
    let mut i = 19;
    if b.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        while b.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    match b.get(i) {
        None => true,
        Some(b'Z') => i + 1 == b.len(),
        Some(b'+') | Some(b'-') => {
            let tz = &b[i + 1..];
            tz.len() == 5
                && tz[0].is_ascii_digit()
                && tz[1].is_ascii_digit()
                && tz[2] == b':'
                && tz[3].is_ascii_digit()
                && tz[4].is_ascii_digit()
        }
        Some(_) => false,
    }
}

/// `<digits>(ms|s|m|h|d)`
pub fn is_duration(text: &str) -> bool {
    with_unit(text, &["ms", "s", "m", "h", "d"])
}

/// `<digits>(B|KB|MB|GB)`
pub fn is_size(text: &str) -> bool {
    with_unit(text, &["B", "KB", "MB", "GB"])
}

fn with_unit(text: &str, units: &[&str]) -> bool {
    units.iter().any(|unit| {
        text.strip_suffix(unit).is_some_and(|digits| {
            !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit())
        })
    })
}
