mod id;

use crate::{mac::InterfaceId, measure::Bandwidth, node::NodeId};
use std::{fmt, str::FromStr};

pub use self::id::LinkId;

/// How faithfully a link models the physics of the shared medium.
///
/// `Partial` and `None` share the zero-delay path: carrier sense is
/// instantaneous and a collision can only happen between transmissions
/// starting at the same instant. `Full` derives a propagation delay from
/// the interfaces' locations, which opens the realistic collision window
/// of twice the propagation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkDetail {
    /// No medium modelling beyond serialisation time.
    None,
    /// Contention without propagation delays.
    #[default]
    Partial,
    /// Contention with location-derived propagation delays.
    Full,
}

impl LinkDetail {
    /// Whether interfaces on this link need a location.
    pub fn requires_locations(self) -> bool {
        matches!(self, LinkDetail::Full)
    }
}

impl fmt::Display for LinkDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDetail::None => "none".fmt(f),
            LinkDetail::Partial => "partial".fmt(f),
            LinkDetail::Full => "full".fmt(f),
        }
    }
}

/// Any spelling that is not `none` or `full` selects `Partial`.
///
/// Historical configurations carried misspellings of `partial` that were
/// accepted by a lenient membership test; parsing is total to keep those
/// configurations working.
impl FromStr for LinkDetail {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "none" => LinkDetail::None,
            "full" => LinkDetail::Full,
            _ => LinkDetail::Partial,
        })
    }
}

/// A shared ethernet bus.
///
/// The link is one collision domain: every attached interface hears every
/// transmission. It owns the attachment list (stable indices, attachment
/// order) while each interface keeps the link id it is attached to; the
/// topology is fixed for the lifetime of a run so no reference counting
/// is involved.
///
/// Links are built through [`Simulation::new_link`] and populated through
/// [`Simulation::attach`].
///
/// [`Simulation::new_link`]: crate::simulation::Simulation::new_link
/// [`Simulation::attach`]: crate::simulation::Simulation::attach
pub struct EthernetLink {
    id: LinkId,
    bandwidth: Bandwidth,
    detail: LinkDetail,
    rx_own_broadcast: bool,
    queue_capacity: usize,
    interfaces: Vec<InterfaceId>,
    nodes: Vec<NodeId>,
}

impl EthernetLink {
    pub(crate) fn new(
        id: LinkId,
        bandwidth: Bandwidth,
        detail: LinkDetail,
        rx_own_broadcast: bool,
        queue_capacity: usize,
    ) -> Self {
        Self {
            id,
            bandwidth,
            detail,
            rx_own_broadcast,
            queue_capacity,
            interfaces: Vec::new(),
            nodes: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// The serialisation rate shared by every interface on the bus.
    #[inline]
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// The medium model, fixed at construction.
    #[inline]
    pub fn detail(&self) -> LinkDetail {
        self.detail
    }

    /// Whether a sender receives its own broadcast frames.
    #[inline]
    pub fn rx_own_broadcast(&self) -> bool {
        self.rx_own_broadcast
    }

    /// Outbound queue depth given to interfaces attached here.
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Attached interfaces, in attachment order.
    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub(crate) fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Index the next attachment will get.
    pub(crate) fn attachment_index(&self) -> usize {
        self.interfaces.len()
    }

    pub(crate) fn add_interface(&mut self, interface: InterfaceId, node: NodeId) {
        self.interfaces.push(interface);
        self.nodes.push(node);
    }
}
