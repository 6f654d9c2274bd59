use std::cmp::Ordering;
use std::str::FromStr;

use serde::Deserialize;

use crate::entry::ImageEntry;
use crate::error::ConfigError;

/// Order of the image list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Arrival order.
    None,
    #[default]
    Alpha,
    /// Digit runs compared as numbers: `file2` before `file10`.
    Numeric,
    /// Newest first.
    Mtime,
    /// Largest first.
    Size,
    /// New entries land at a random existing position.
    Random,
}

impl Order {
    pub fn name(self) -> &'static str {
        match self {
            Order::None => "none",
            Order::Alpha => "alpha",
            Order::Numeric => "numeric",
            Order::Mtime => "mtime",
            Order::Size => "size",
            Order::Random => "random",
        }
    }

    /// Orders that place entries with the comparator.
    pub fn is_sorted(self) -> bool {
        !matches!(self, Order::None | Order::Random)
    }
}

impl FromStr for Order {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Order::None),
            "alpha" => Ok(Order::Alpha),
            "numeric" => Ok(Order::Numeric),
            "mtime" => Ok(Order::Mtime),
            "size" => Ok(Order::Size),
            "random" => Ok(Order::Random),
            _ => Err(ConfigError::InvalidValue {
                key: "order",
                value: s.to_string(),
            }),
        }
    }
}

/// Compares a new entry against an existing one.
///
/// `Less` means the new entry belongs in front of the existing one when the
/// list is not reversed. Unsorted orders always compare equal.
pub fn compare(order: Order, new: &ImageEntry, existing: &ImageEntry) -> Ordering {
    match order {
        Order::Alpha => new.source().cmp(existing.source()),
        Order::Numeric => numeric_cmp(new.source(), existing.source()),
        Order::Mtime => existing.file_time().cmp(&new.file_time()),
        Order::Size => existing.file_size().cmp(&new.file_size()),
        Order::None | Order::Random => Ordering::Equal,
    }
}

/// Whether `new` should be inserted before `existing`.
pub fn goes_before(order: Order, reverse: bool, new: &ImageEntry, existing: &ImageEntry) -> bool {
    matches!(
        (reverse, compare(order, new, existing)),
        (false, Ordering::Less) | (true, Ordering::Greater)
    )
}

/// Byte-wise comparison where runs of ASCII digits compare by value.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (na, ni) = parse_run(a, i);
            let (nb, nj) = parse_run(b, j);
            match na.cmp(&nb) {
                Ordering::Equal => {
                    i = ni;
                    j = nj;
                }
                other => return other,
            }
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                other => return other,
            }
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

/// Parses the digit run starting at `pos`; saturates like `strtoull`.
fn parse_run(s: &[u8], pos: usize) -> (u64, usize) {
    let mut value: u64 = 0;
    let mut end = pos;
    while end < s.len() && s[end].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((s[end] - b'0') as u64);
        end += 1;
    }
    (value, end)
}
