use anyhow::{anyhow, bail, ensure, Result};
use std::{fmt, str};

/// A 48-bit medium access address.
///
/// ```
/// # use ethersim_core::packet::MacAddr;
/// let addr: MacAddr = "02:00:00:00:00:2a".parse().unwrap();
/// assert_eq!(addr.to_string(), "02:00:00:00:00:2a");
/// assert!(!addr.is_broadcast());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: Self = Self([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(self) -> [u8; 6] {
        self.0
    }

    #[inline]
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    /// A locally administered unicast address derived from an index.
    ///
    /// Used when an interface is attached without an explicit address;
    /// the index is the interface's creation order so every interface of
    /// a simulation gets a distinct, stable address.
    pub(crate) fn locally_administered(index: u64) -> Self {
        let [_, _, _, a, b, c, d, e] = index.to_be_bytes();
        Self([0x02, a, b, c, d, e])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl str::FromStr for MacAddr {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut components = s.split(':');

        for octet in octets.iter_mut() {
            let component = components
                .next()
                .ok_or_else(|| anyhow!("expected 6 `:' separated octets"))?;
            *octet = u8::from_str_radix(component, 16)
                .map_err(|error| anyhow!("invalid octet `{component}': {error}"))?;
        }
        ensure!(
            components.next().is_none(),
            "expected 6 `:' separated octets"
        );

        Ok(Self(octets))
    }
}

/// One encapsulation layer of a packet.
///
/// The stack is opaque to the MAC except for the ethernet header the MAC
/// pushes itself on send; higher layers are free to add their own tags
/// before handing the packet down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PduHeader {
    Ethernet {
        src: MacAddr,
        dst: MacAddr,
        ethertype: u16,
    },
}

/// Ethertype tag used when the sender does not specify one.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// # A simulated frame payload
///
/// A [`Packet`] is what travels on the bus: a payload of a known byte
/// size wrapped in a stack of protocol headers. The payload content
/// itself is never modelled, only its size matters to the medium.
///
/// The retransmission counter belongs to the owning interface: it is
/// reset when a fresh higher-layer send begins and only the interface's
/// retransmit path increments it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    size: u64,
    retx_count: u32,
    headers: Vec<PduHeader>,
}

pub struct PacketBuilder {
    size: Option<u64>,
}

impl Packet {
    pub fn builder() -> PacketBuilder {
        PacketBuilder::new()
    }

    /// payload size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// how many transmission attempts the owning interface has made.
    #[inline]
    pub fn retx_count(&self) -> u32 {
        self.retx_count
    }

    pub(crate) fn set_retx_count(&mut self, count: u32) {
        self.retx_count = count;
    }

    pub(crate) fn bump_retx_count(&mut self) -> u32 {
        self.retx_count += 1;
        self.retx_count
    }

    pub(crate) fn decrement_retx_count(&mut self) {
        self.retx_count = self.retx_count.saturating_sub(1);
    }

    /// the encapsulation stack, outermost last.
    pub fn headers(&self) -> &[PduHeader] {
        &self.headers
    }

    pub(crate) fn push_header(&mut self, header: PduHeader) {
        self.headers.push(header);
    }

    /// source address of the outermost ethernet header, if any.
    pub fn src(&self) -> Option<MacAddr> {
        self.headers.iter().rev().find_map(|header| match header {
            PduHeader::Ethernet { src, .. } => Some(*src),
        })
    }

    /// destination address of the outermost ethernet header, if any.
    pub fn dst(&self) -> Option<MacAddr> {
        self.headers.iter().rev().find_map(|header| match header {
            PduHeader::Ethernet { dst, .. } => Some(*dst),
        })
    }

    /// whether the outermost ethernet header addresses everyone.
    pub fn is_broadcast(&self) -> bool {
        self.dst().is_some_and(MacAddr::is_broadcast)
    }
}

/// Short one-token summary used by the trace fabric.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.src(), self.dst()) {
            (Some(src), Some(dst)) => write!(f, "{size}b {src}>{dst}", size = self.size),
            _ => write!(f, "{size}b", size = self.size),
        }
    }
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// payload size, in bytes; must be positive.
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn build(self) -> Result<Packet> {
        let Some(size) = self.size else {
            bail!("Missing packet size (`size')")
        };
        ensure!(size > 0, "Packet size must be positive");

        Ok(Packet {
            size,
            retx_count: 0,
            headers: Vec::new(),
        })
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self { size: None }
    }
}
