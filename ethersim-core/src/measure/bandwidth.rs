use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// The transmission rate of a shared medium, in bits per second.
///
/// Every MAC constant is expressed in bit times: dividing by the link's
/// [`Bandwidth`] turns it into seconds. A 512 bit-time slot on a 10mbps
/// bus is 51.2µs; the same slot on gigabit is 512ns.
///
/// # Example
///
/// ```
/// # use ethersim_core::measure::Bandwidth;
/// let bw: Bandwidth = "10mbps".parse().unwrap();
///
/// // a 1000 byte frame occupies the medium for 800µs
/// assert_eq!(bw.transmission_time(1_000), 0.0008);
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth(u64);

impl Bandwidth {
    /// create a new [`Bandwidth`] of the given bits per second.
    pub const fn new(bits_per_second: u64) -> Self {
        Self(bits_per_second)
    }

    /// the raw rate in bits per second.
    pub const fn bits_per_second(self) -> u64 {
        self.0
    }

    /// seconds needed to put `bits` bit times on the wire.
    #[inline]
    pub fn bit_time(self, bits: u64) -> f64 {
        bits as f64 / self.0 as f64
    }

    /// seconds needed to transmit a frame of `bytes` bytes.
    #[inline]
    pub fn transmission_time(self, bytes: u64) -> f64 {
        self.bit_time(bytes * 8)
    }
}

const K: u64 = 1_000;
const M: u64 = 1_000_000;
const G: u64 = 1_000_000_000;

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        let k = v / K;
        let m = v / M;
        let g = v / G;

        let v_r = v % K;
        let k_r = v % M;
        let m_r = v % G;

        if v < K || v_r != 0 {
            write!(f, "{v}bps")
        } else if v < M || k_r != 0 {
            write!(f, "{k}kbps")
        } else if v < G || m_r != 0 {
            write!(f, "{m}mbps")
        } else {
            write!(f, "{g}gbps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum BandwidthToken {
    #[regex("bps")]
    Bps,
    #[regex("kbps")]
    Kbps,
    #[regex("mbps")]
    Mbps,
    #[regex("gbps")]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for Bandwidth {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, BandwidthToken>::new(s);

        let Some(Ok(BandwidthToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let bps = match token {
            BandwidthToken::Bps => number,
            BandwidthToken::Kbps => number * K,
            BandwidthToken::Mbps => number * M,
            BandwidthToken::Gbps => number * G,
            BandwidthToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a bandwidth"
        );

        Ok(Self::new(bps))
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        crate::defaults::DEFAULT_BANDWIDTH
    }
}
