use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a shared-medium link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct LinkId(u64);

impl LinkId {
    pub const ZERO: Self = LinkId::new(0);

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl str::FromStr for LinkId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", LinkId(7)), "7")
    }
    #[test]
    fn parse() {
        assert_eq!("7".parse::<LinkId>().unwrap(), LinkId(7));
    }
}
