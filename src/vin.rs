//! VIN decomposition, increment, and re-padding.
//!
//! A VIN string is split into a non-numeric `prefix`, a `numeric` tail, and
//! the zero-`pad` width that tail was written at. `vin == prefix +
//! zero_pad(numeric, pad)` is the load-bearing invariant: every mutation
//! goes through [`Vin::increment`] to preserve it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vin {
    prefix: String,
    numeric: u64,
    pad: usize,
}

impl Vin {
    /// Parse a VIN string into prefix/numeric/pad. The numeric tail is the
    /// longest run of trailing ASCII digits; everything before it is the
    /// prefix. A VIN with no trailing digits gets numeric=0, pad=1 appended,
    /// e.g. `"XYZ7"` decomposes to prefix `"XYZ7"`, numeric `"0"`, stored
    /// VIN `"XYZ70"`.
    pub fn parse(raw: &str) -> Self {
        let digit_count = raw.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        if digit_count == 0 {
            return Self {
                prefix: raw.to_string(),
                numeric: 0,
                pad: 1,
            };
        }
        let split_at = raw.len() - digit_count;
        let prefix = raw[..split_at].to_string();
        let numeric_str = &raw[split_at..];
        let numeric: u64 = numeric_str.parse().unwrap_or(0);
        Self {
            prefix,
            numeric,
            pad: numeric_str.len(),
        }
    }

    /// Render back to the full VIN string.
    pub fn as_string(&self) -> String {
        format!("{}{:0>width$}", self.prefix, self.numeric, width = self.pad)
    }

    /// Increment the numeric tail by one, re-padding to the same width
    /// (widening the pad if the increment overflows it, e.g. 99 -> 100).
    pub fn increment(&mut self) {
        self.numeric += 1;
        let digits = self.numeric.to_string().len();
        if digits > self.pad {
            self.pad = digits;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_and_numeric() {
        let v = Vin::parse("AB123000");
        assert_eq!(v.as_string(), "AB123000");
    }

    #[test]
    fn no_trailing_digits_appends_zero() {
        // "XYZ7" has no trailing digits -> prefix "XYZ7", numeric 0, pad 1
        let v = Vin::parse("XYZ7");
        assert_eq!(v.as_string(), "XYZ70");
    }

    #[test]
    fn increment_preserves_width() {
        let mut v = Vin::parse("AB123000");
        v.increment();
        assert_eq!(v.as_string(), "AB123001");
    }

    #[test]
    fn increment_widens_on_overflow() {
        let mut v = Vin::parse("CAR99");
        v.increment();
        assert_eq!(v.as_string(), "CAR100");
    }

    #[test]
    fn invariant_holds_across_many_increments() {
        let mut v = Vin::parse("LOT00045");
        for _ in 0..100_000 {
            v.increment();
            let rendered = v.as_string();
            let reparsed = Vin::parse(&rendered);
            // Re-parsing what we rendered must reproduce the same string.
            assert_eq!(reparsed.as_string(), rendered);
        }
    }
}
