//! Byte counts as given on the command line.

use std::{fmt, str::FromStr};

/// A non-zero number of bytes, written either as a plain integer or with a
/// binary suffix (`4K`, `64KiB`, `1M`, `2G`...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteSize(pub u64);

impl FromStr for ByteSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);
        if digits.is_empty() {
            anyhow::bail!("{s:?} does not start with a number");
        }
        let value: u64 = digits.parse()?;
        let shift = match suffix.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 0,
            "k" | "kb" | "kib" => 10,
            "m" | "mb" | "mib" => 20,
            "g" | "gb" | "gib" => 30,
            "t" | "tb" | "tib" => 40,
            other => anyhow::bail!("unknown size suffix {other:?}"),
        };
        let bytes = value
            .checked_mul(1 << shift)
            .ok_or_else(|| anyhow::anyhow!("{s:?} does not fit in 64 bits"))?;
        if bytes == 0 {
            anyhow::bail!("size must be greater than zero");
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u32, &str); 4] = [(40, "TiB"), (30, "GiB"), (20, "MiB"), (10, "KiB")];
        for (shift, unit) in UNITS {
            let scale = 1u64 << shift;
            if self.0 >= scale && self.0 % scale == 0 {
                return write!(f, "{}{}", self.0 / scale, unit);
            }
        }
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::ByteSize;

    #[test]
    fn parses_plain_and_suffixed() {
        assert_eq!("1024".parse::<ByteSize>().unwrap(), ByteSize(1024));
        assert_eq!("4K".parse::<ByteSize>().unwrap(), ByteSize(4096));
        assert_eq!("64KiB".parse::<ByteSize>().unwrap(), ByteSize(64 * 1024));
        assert_eq!("1m".parse::<ByteSize>().unwrap(), ByteSize(1 << 20));
        assert_eq!("2 GiB".parse::<ByteSize>().unwrap(), ByteSize(2 << 30));
    }

    #[test]
    fn rejects_nonsense() {
        assert!("0".parse::<ByteSize>().is_err());
        assert!("0M".parse::<ByteSize>().is_err());
        assert!("M".parse::<ByteSize>().is_err());
        assert!("12 parsecs".parse::<ByteSize>().is_err());
        assert!("-5".parse::<ByteSize>().is_err());
        assert!("99999999999T".parse::<ByteSize>().is_err());
    }

    #[test]
    fn displays_in_the_largest_exact_unit() {
        assert_eq!(ByteSize(1 << 20).to_string(), "1MiB");
        assert_eq!(ByteSize(3 * 1024).to_string(), "3KiB");
        assert_eq!(ByteSize(1000).to_string(), "1000");
        for s in ["1MiB", "3KiB", "1000"] {
            assert_eq!(s.parse::<ByteSize>().unwrap().to_string(), s);
        }
    }
}
