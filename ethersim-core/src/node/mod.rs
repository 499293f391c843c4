mod id;

pub use self::id::NodeId;
use crate::{geo::Location, mac::InterfaceId};

/// A simulated host.
///
/// A `Node` is little more than an anchor: it carries the `uid` shown in
/// trace records, an optional [`Location`] used by full-detail links to
/// derive propagation delays, an up/down status, and the list of
/// interfaces attached on its behalf. You never construct a `Node`
/// directly — use [`Simulation::new_node`] to get a [`NodeBuilder`].
///
/// While a node is down its interfaces drop every packet, on send and on
/// delivery, reporting the send-side drops through the trace fabric.
///
/// [`Simulation::new_node`]: crate::simulation::Simulation::new_node
/// [`NodeBuilder`]: crate::simulation::NodeBuilder
pub struct Node {
    id: NodeId,
    location: Option<Location>,
    up: bool,
    interfaces: Vec<InterfaceId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, location: Option<Location>) -> Self {
        Self {
            id,
            location,
            up: true,
            interfaces: Vec::new(),
        }
    }

    /// Returns the unique identifier of this node.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's position on the plane, if one was configured.
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Whether the node is accepting and emitting traffic.
    #[inline]
    pub fn is_up(&self) -> bool {
        self.up
    }

    pub(crate) fn set_up(&mut self, up: bool) {
        self.up = up;
    }

    /// Interfaces attached for this node, in attachment order.
    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub(crate) fn add_interface(&mut self, interface: InterfaceId) {
        self.interfaces.push(interface);
    }
}
