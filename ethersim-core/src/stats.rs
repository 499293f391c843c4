//! Simulation statistics and observability types.
//!
//! [`SimStats`] provides a point-in-time snapshot of the MAC counters.
//! Obtain one via [`Simulation::stats`](crate::simulation::Simulation::stats).

use crate::{link::LinkId, mac::InterfaceId, node::NodeId};

/// Snapshot of the counters of a single interface.
#[derive(Debug, Clone)]
pub struct InterfaceStats {
    /// The interface's identifier.
    pub interface: InterfaceId,
    /// The node owning the interface.
    pub node: NodeId,
    /// The link the interface is attached to.
    pub link: LinkId,
    /// Transmissions started (including ones later cut by a collision).
    pub packets_sent: u64,
    /// Collisions detected while transmitting.
    pub collisions: u64,
    /// Attempts deferred because the medium was sensed busy.
    pub backoffs: u64,
    /// Frames lost to the attempt cap or a full queue.
    pub queue_drops: u64,
    /// Frames lost because the node was down.
    pub down_drops: u64,
    /// Frames delivered up through this interface.
    pub deliveries: u64,
    /// Packets currently waiting in the outbound queue.
    pub queued: usize,
}

/// Point-in-time snapshot of every interface in the simulation.
#[derive(Debug, Clone)]
pub struct SimStats {
    /// Per-interface statistics, in attachment order.
    pub interfaces: Vec<InterfaceStats>,
}

impl SimStats {
    /// Sum of delivered frames across all interfaces.
    pub fn total_deliveries(&self) -> u64 {
        self.interfaces.iter().map(|stats| stats.deliveries).sum()
    }

    /// Sum of detected collisions across all interfaces.
    pub fn total_collisions(&self) -> u64 {
        self.interfaces.iter().map(|stats| stats.collisions).sum()
    }
}
