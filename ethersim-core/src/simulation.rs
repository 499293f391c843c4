/*!
# The simulation context

[`Simulation`] is the entry point: it owns the [`Scheduler`], the node,
link and interface tables, and the default [`TraceStream`], threading them
through every MAC transition. There is no process-global state — multiple
simulations can coexist in one process and tests construct independent
contexts.

All cross-component interaction is a value in the closed [`Event`] enum,
scheduled on the single event queue. Dispatch is a match: no callbacks
held in the queue, no hidden control stack, every resumption explicit.
*/

use crate::{
    geo::{self, Location},
    link::{EthernetLink, LinkDetail, LinkId},
    mac::{Interface, InterfaceId, MacTimer, Peer},
    measure::Bandwidth,
    node::{Node, NodeId},
    packet::{MacAddr, Packet},
    scheduler::Scheduler,
    stats::{InterfaceStats, SimStats},
    time::SimTime,
    trace::TraceStream,
};
use thiserror::Error;

/// Everything that can happen in the simulated network.
///
/// Self-timers ([`Retransmit`], [`ChannelAcquired`], [`TxComplete`]) are
/// additionally tracked in the owning interface's timer table so they can
/// be cancelled; the rest are fire-and-forget messages between
/// interfaces, delayed by bus propagation.
///
/// [`Retransmit`]: Event::Retransmit
/// [`ChannelAcquired`]: Event::ChannelAcquired
/// [`TxComplete`]: Event::TxComplete
#[derive(Debug, Clone)]
pub enum Event {
    /// A higher layer hands a packet to an interface.
    Send {
        interface: InterfaceId,
        packet: Packet,
        dst: MacAddr,
    },
    /// Retransmit self-timer: re-attempt the head of the queue.
    Retransmit(InterfaceId),
    /// The first bit of a peer's frame reaches an interface.
    FirstBit { interface: InterfaceId, size: u64 },
    /// A colliding sender's jam has propagated past an interface.
    Clear(InterfaceId),
    /// Channel-acquired watchdog: contention won without collision.
    ChannelAcquired(InterfaceId),
    /// An interface's own transmission reached its last bit.
    TxComplete(InterfaceId),
    /// A complete frame copy arrives at an interface.
    Deliver {
        interface: InterfaceId,
        packet: Packet,
    },
}

/// A frame handed up to the higher layer at a receiving interface.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub time: SimTime,
    pub node: NodeId,
    pub interface: InterfaceId,
    pub packet: Packet,
}

/// Error returned when a node cannot be attached to a link.
#[derive(Debug, Error)]
pub enum AttachError {
    #[error("Node ({node}) Not Found")]
    NodeNotFound { node: NodeId },
    #[error("Link ({link}) Not Found")]
    LinkNotFound { link: LinkId },
    /// A node holds at most one interface per link.
    #[error("Node ({node}) is already attached to link ({link})")]
    AlreadyAttached { node: NodeId, link: LinkId },
}

/// The execution context of a simulated ethernet.
///
/// See the [crate] documentation for a walk-through. Topology is built
/// first ([`Simulation::new_node`], [`Simulation::new_link`],
/// [`Simulation::attach`]); traffic is injected with
/// [`Simulation::send`]/[`Simulation::schedule_send`]; and
/// [`Simulation::run_with`] drives the event queue, handing every
/// received frame to the caller's closure.
pub struct Simulation {
    scheduler: Scheduler<Event>,
    nodes: Vec<Node>,
    links: Vec<EthernetLink>,
    interfaces: Vec<Interface>,
    trace: TraceStream,
    seed: u64,
}

pub struct NodeBuilder<'a> {
    location: Option<Location>,
    simulation: &'a mut Simulation,
}

/// Builder for configuring a shared bus.
///
/// Obtained via [`Simulation::new_link`]. Call [`LinkBuilder::build`] to
/// commit the configuration and get the [`LinkId`].
pub struct LinkBuilder<'a> {
    bandwidth: Bandwidth,
    detail: LinkDetail,
    rx_own_broadcast: bool,
    queue_capacity: usize,
    simulation: &'a mut Simulation,
}

impl NodeBuilder<'_> {
    /// Place the node on the plane; full-detail links use this to derive
    /// propagation delays.
    pub fn set_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn build(self) -> NodeId {
        let Self {
            location,
            simulation,
        } = self;

        let id = NodeId::new(simulation.nodes.len() as u64);
        simulation.nodes.push(Node::new(id, location));

        id
    }
}

impl LinkBuilder<'_> {
    /// Set the serialisation rate of the bus.
    pub fn set_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Set the medium model; fixed once built.
    pub fn set_detail(mut self, detail: LinkDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Whether a broadcast sender receives its own frame.
    pub fn set_rx_own_broadcast(mut self, rx_own_broadcast: bool) -> Self {
        self.rx_own_broadcast = rx_own_broadcast;
        self
    }

    /// Outbound queue depth of interfaces attached to this link.
    pub fn set_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Commit the link configuration to the simulation.
    pub fn build(self) -> LinkId {
        let Self {
            bandwidth,
            detail,
            rx_own_broadcast,
            queue_capacity,
            simulation,
        } = self;

        let id = LinkId::new(simulation.links.len() as u64);
        simulation.links.push(EthernetLink::new(
            id,
            bandwidth,
            detail,
            rx_own_broadcast,
            queue_capacity,
        ));

        id
    }
}

impl Simulation {
    /// A fresh context tracing to standard output.
    pub fn new() -> Self {
        Self::with_trace(TraceStream::to_stdout())
    }

    /// A fresh context with the given default trace stream.
    pub fn with_trace(trace: TraceStream) -> Self {
        Self {
            scheduler: Scheduler::new(),
            nodes: Vec::new(),
            links: Vec::new(),
            interfaces: Vec::new(),
            trace,
            seed: crate::defaults::DEFAULT_SEED,
        }
    }

    /// Base seed for the per-interface backoff generators.
    ///
    /// Applies to interfaces attached after the call; each interface
    /// derives its own seed from the base and its attachment index.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Create a new node and return a builder to configure it.
    ///
    /// Node identifiers are assigned sequentially from zero; the value is
    /// the `uid` printed in trace records.
    pub fn new_node(&mut self) -> NodeBuilder<'_> {
        NodeBuilder {
            location: None,
            simulation: self,
        }
    }

    /// Create a new shared bus and return a builder to configure it.
    pub fn new_link(&mut self) -> LinkBuilder<'_> {
        LinkBuilder {
            bandwidth: Bandwidth::default(),
            detail: LinkDetail::default(),
            rx_own_broadcast: false,
            queue_capacity: crate::defaults::DEFAULT_QUEUE_CAPACITY,
            simulation: self,
        }
    }

    /// Attach a node to an ethernet link, creating the MAC interface.
    ///
    /// The interface takes the link's bandwidth and queue depth, gets a
    /// stable locally-administered address and a deterministic RNG seed.
    /// On a full-detail link the interface is placed at the node's
    /// location, or at `(0, attachment_index)` when the node has none.
    ///
    /// # Errors
    ///
    /// [`AttachError::AlreadyAttached`] — a node holds at most one
    /// interface per link.
    pub fn attach(&mut self, node: NodeId, link: LinkId) -> Result<InterfaceId, AttachError> {
        let Some(node_ref) = self.nodes.get_mut(node.index()) else {
            return Err(AttachError::NodeNotFound { node });
        };
        let Some(link_ref) = self.links.get_mut(link.index()) else {
            return Err(AttachError::LinkNotFound { link });
        };
        if link_ref.is_attached(node) {
            return Err(AttachError::AlreadyAttached { node, link });
        }

        let attachment_index = link_ref.attachment_index();
        let location = if link_ref.detail().requires_locations() {
            Some(
                node_ref
                    .location()
                    .unwrap_or(Location::new(0.0, attachment_index as f64)),
            )
        } else {
            None
        };

        let id = InterfaceId::new(self.interfaces.len() as u64);
        let interface = Interface::new(
            id,
            node,
            link,
            MacAddr::locally_administered(id.value()),
            link_ref.bandwidth(),
            location,
            link_ref.rx_own_broadcast(),
            link_ref.queue_capacity(),
            self.seed.wrapping_add(id.value()),
        );

        node_ref.add_interface(id);
        link_ref.add_interface(id, node);
        self.interfaces.push(interface);

        self.rebuild_peers(link);

        Ok(id)
    }

    /// Recompute the peer delay tables of every interface on `link`.
    ///
    /// The topology is fixed during a run, so paying the pairwise delays
    /// once per attachment keeps the hot path free of geometry.
    fn rebuild_peers(&mut self, link: LinkId) {
        let members = self.links[link.index()].interfaces().to_vec();

        for &interface in &members {
            let origin = self.interfaces[interface.index()].location();
            let peers: Vec<Peer> = members
                .iter()
                .copied()
                .filter(|&peer| peer != interface)
                .map(|peer| {
                    let delay = match (origin, self.interfaces[peer.index()].location()) {
                        (Some(a), Some(b)) => geo::propagation_delay(a, b),
                        _ => 0.0,
                    };
                    Peer {
                        interface: peer,
                        delay,
                    }
                })
                .collect();
            self.interfaces[interface.index()].set_peers(peers);
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn link(&self, id: LinkId) -> &EthernetLink {
        &self.links[id.index()]
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.index()]
    }

    /// Bring a node up or down. A down node drops frames on send and on
    /// delivery.
    pub fn set_node_up(&mut self, id: NodeId, up: bool) {
        self.nodes[id.index()].set_up(up);
    }

    /// The context's default trace stream.
    pub fn trace_mut(&mut self) -> &mut TraceStream {
        &mut self.trace
    }

    /// Hand a packet to an interface for transmission, now.
    ///
    /// Equivalent to [`Simulation::schedule_send`] with a zero delay,
    /// except the MAC runs immediately instead of from the event queue.
    pub fn send(&mut self, interface: InterfaceId, packet: Packet, dst: MacAddr) {
        let up = self.nodes[self.interfaces[interface.index()].node().index()].is_up();
        let Self {
            scheduler,
            interfaces,
            trace,
            ..
        } = self;
        interfaces[interface.index()].send(scheduler, trace, packet, dst, up);
    }

    /// Hand a packet to an interface `delay` seconds from now.
    pub fn schedule_send(&mut self, delay: f64, interface: InterfaceId, packet: Packet, dst: MacAddr) {
        self.scheduler.schedule(
            delay,
            Event::Send {
                interface,
                packet,
                dst,
            },
        );
    }

    /// Drive the event queue, handing received frames to `on_delivery`.
    ///
    /// Runs until the queue is empty or the next event lies beyond
    /// `until`. Frames addressed to a down node are dropped; broadcast
    /// frames are handed to every listening interface.
    pub fn run_with<H>(&mut self, until: Option<SimTime>, mut on_delivery: H)
    where
        H: FnMut(Delivery),
    {
        let Self {
            scheduler,
            nodes,
            interfaces,
            trace,
            ..
        } = self;

        scheduler.run(until, |scheduler, event| {
            dispatch(scheduler, nodes, interfaces, trace, event, &mut on_delivery)
        });

        trace.flush();
    }

    /// Run to completion, discarding deliveries.
    pub fn run(&mut self) {
        self.run_with(None, |_| ());
    }

    /// Returns a point-in-time snapshot of every interface's counters.
    pub fn stats(&self) -> SimStats {
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| InterfaceStats {
                interface: interface.id(),
                node: interface.node(),
                link: interface.link(),
                packets_sent: interface.counters.packets_sent,
                collisions: interface.counters.collisions,
                backoffs: interface.counters.backoffs,
                queue_drops: interface.counters.queue_drops,
                down_drops: interface.counters.down_drops,
                deliveries: interface.counters.deliveries,
                queued: interface.queue_len(),
            })
            .collect();

        SimStats { interfaces }
    }

    /// Restore every component to its post-construction state.
    ///
    /// The event queue empties and the clock returns to zero, interfaces
    /// forget their queues, timers and backoff state and reseed their
    /// generators, nodes come back up, and the trace line discipline
    /// restarts — in that order, the trace last so earlier resets cannot
    /// write through a stale cursor. Idempotent; a reset simulation fed
    /// the same events produces byte-identical trace output.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        for interface in &mut self.interfaces {
            interface.reset();
        }
        for node in &mut self.nodes {
            node.set_up(true);
        }
        self.trace.reset(SimTime::ZERO);
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch<H>(
    scheduler: &mut Scheduler<Event>,
    nodes: &mut [Node],
    interfaces: &mut [Interface],
    trace: &mut TraceStream,
    event: Event,
    on_delivery: &mut H,
) where
    H: FnMut(Delivery),
{
    match event {
        Event::Send {
            interface,
            packet,
            dst,
        } => {
            let up = nodes[interfaces[interface.index()].node().index()].is_up();
            interfaces[interface.index()].send(scheduler, trace, packet, dst, up);
        }
        Event::Retransmit(interface) => {
            let interface = &mut interfaces[interface.index()];
            interface.timer_fired(MacTimer::Retransmit);
            interface.retransmit(scheduler, trace, None);
        }
        Event::FirstBit { interface, size } => {
            interfaces[interface.index()].first_bit_received(scheduler, trace, size);
        }
        Event::Clear(interface) => {
            interfaces[interface.index()].clear_channel(scheduler);
        }
        Event::ChannelAcquired(interface) => {
            let interface = &mut interfaces[interface.index()];
            interface.timer_fired(MacTimer::ChanAcq);
            interface.channel_acquired();
        }
        Event::TxComplete(interface) => {
            let interface = &mut interfaces[interface.index()];
            interface.timer_fired(MacTimer::Receive);
            interface.transmission_complete(scheduler);
        }
        Event::Deliver { interface, packet } => {
            let iface = &mut interfaces[interface.index()];
            let node = &nodes[iface.node().index()];

            if !node.is_up() {
                let source = iface.trace_source();
                trace.write_trace(
                    scheduler.now(),
                    &source,
                    Some("drp"),
                    None,
                    Some(&packet),
                    "L2-ID",
                );
                iface.counters.down_drops += 1;
                return;
            }

            let addressed_here = packet.dst() == Some(iface.mac()) || packet.is_broadcast();
            if addressed_here {
                iface.counters.deliveries += 1;
                on_delivery(Delivery {
                    time: scheduler.now(),
                    node: iface.node(),
                    interface,
                    packet,
                });
            }
        }
    }
}
