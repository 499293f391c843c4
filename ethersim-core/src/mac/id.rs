use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a MAC interface.
///
/// One interface exists per (node, link) attachment and lives for the
/// whole run; identifiers are assigned sequentially in attachment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct InterfaceId(u64);

impl InterfaceId {
    pub const ZERO: Self = InterfaceId::new(0);

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn value(self) -> u64 {
        self.0
    }
}

impl str::FromStr for InterfaceId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", InterfaceId(3)), "3")
    }
    #[test]
    fn parse() {
        assert_eq!("3".parse::<InterfaceId>().unwrap(), InterfaceId(3));
    }
}
