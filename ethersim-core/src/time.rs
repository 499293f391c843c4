use anyhow::{anyhow, bail, ensure, Result};
use core::fmt;
use logos::{Lexer, Logos};
use std::{
    cmp::Ordering,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

/// A point on the simulation clock, in seconds.
///
/// [`SimTime`] is a real-valued scalar: the simulated network runs at
/// whatever granularity the events require (classic Ethernet frames are
/// hundreds of microseconds long, propagation delays are nanoseconds).
///
/// # Parsing
///
/// ```
/// # use ethersim_core::time::SimTime;
/// let t: SimTime = "800us".parse().unwrap();
/// assert_eq!(t, SimTime::from_micros(800));
///
/// // units may be combined
/// let t: SimTime = "1s 500ms".parse().unwrap();
/// assert_eq!(t.as_secs(), 1.5);
/// ```
///
/// # The `UNKNOWN` sentinel
///
/// [`SimTime::UNKNOWN`] (positive infinity) is strictly greater than every
/// finite time. The MAC uses it for "a transmission is in progress but its
/// end is not known yet": comparing `now < UNKNOWN` is always true, so an
/// unknown busy end reads as a busy channel without special casing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimTime(f64);

impl SimTime {
    /// The origin of the simulation clock.
    pub const ZERO: Self = Self(0.0);

    /// "Not known yet"; compares greater than every finite time.
    pub const UNKNOWN: Self = Self(f64::INFINITY);

    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis as f64 * 1e-3)
    }

    pub fn from_micros(micros: u64) -> Self {
        Self(micros as f64 * 1e-6)
    }

    #[inline]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// Returns `true` for the [`SimTime::UNKNOWN`] sentinel.
    #[inline]
    pub fn is_unknown(self) -> bool {
        self.0.is_infinite()
    }

    /// The later of the two times.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}
impl Eq for SimTime {}
impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Advance a time by a number of seconds.
impl Add<f64> for SimTime {
    type Output = SimTime;
    fn add(self, seconds: f64) -> SimTime {
        SimTime(self.0 + seconds)
    }
}
impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, seconds: f64) {
        self.0 += seconds;
    }
}

/// The elapsed seconds between two times.
impl Sub for SimTime {
    type Output = f64;
    fn sub(self, other: SimTime) -> f64 {
        self.0 - other.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for SimTime {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);

        let mut total = 0f64;
        let mut any = false;

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let seconds = match measure {
                Token::NanoSeconds => number as f64 * 1e-9,
                Token::MicroSeconds => number as f64 * 1e-6,
                Token::MilliSeconds => number as f64 * 1e-3,
                Token::Seconds => number as f64,
                Token::Minutes => number as f64 * 60.0,
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            total += seconds;
            any = true;
        }

        ensure!(any, "Empty duration: {s}");

        Ok(Self(total))
    }
}
