/*!
# `ethersim` core library

This crate provides the core of a discrete-event ethernet simulator: a
shared-bus CSMA/CD MAC with binary exponential backoff, the event
[`Scheduler`] driving it, and the [`TraceStream`] fabric observing it.

The simulation is single-threaded and cooperative: all concurrency in
the simulated network is future-dated events on one queue, which makes a
run bit-for-bit reproducible from its seeds. There is no wall clock —
a microsecond of simulated ethernet costs whatever the events in it cost.

# Building a [`Simulation`]

The main component of this crate is the [`Simulation`] object. It allows
to build the topology: create [`Node`]s, configure the shared bus (its
[`Bandwidth`], its medium model via [`LinkDetail`]) and attach nodes to
it, which creates the MAC [`Interface`]s.

```
use ethersim_core::Simulation;

# fn f() -> anyhow::Result<()> {
let mut simulation = Simulation::new();

// two stations on a classic 10mbps bus
let n0 = simulation.new_node().build();
let n1 = simulation.new_node().build();
let bus = simulation
    .new_link()
    .set_bandwidth("10mbps".parse()?)
    .build();

let i0 = simulation.attach(n0, bus)?;
let i1 = simulation.attach(n1, bus)?;
# Ok(()) }; f().unwrap();
```

# Sending frames

A [`Packet`] only models its size; hand it to an interface together with
the destination address and drive the queue with
[`Simulation::run_with`], which calls back for every frame received:

```
# use ethersim_core::{Packet, Simulation};
# fn f() -> anyhow::Result<()> {
# let mut simulation = Simulation::new();
# let n0 = simulation.new_node().build();
# let n1 = simulation.new_node().build();
# let bus = simulation.new_link().set_bandwidth("10mbps".parse()?).build();
# let i0 = simulation.attach(n0, bus)?;
# let i1 = simulation.attach(n1, bus)?;
let packet = Packet::builder().size(1_000).build()?;
let dst = simulation.interface(i1).mac();

simulation.schedule_send(0.0, i0, packet, dst);

let mut received = 0;
simulation.run_with(None, |_delivery| received += 1);

// 1000 bytes at 10mbps: the frame arrives 800µs in
assert_eq!(received, 1);
# Ok(()) }; f().unwrap();
```

When two stations contend for the bus the MAC does what real ethernet
does: detects the collision, jams, backs off a random number of slots
(doubling the window per collision, up to the limit) and retries, giving
up after [`ATTEMPT_LIMIT`] attempts.

# Observing a run

Every observable MAC action is reported to the simulation's
[`TraceStream`], disabled by default. Enable it per node, per protocol
instance or for the whole layer:

```
# use ethersim_core::{Simulation, TraceEntity, TraceStatus};
# let mut simulation = Simulation::new();
simulation
    .trace_mut()
    .set_status(TraceEntity::Layer(2), TraceStatus::Enabled);
```

[`ATTEMPT_LIMIT`]: crate::mac::ATTEMPT_LIMIT
*/

pub mod defaults;
pub mod geo;
pub mod link;
pub mod mac;
pub mod measure;
pub mod node;
pub mod packet;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod time;
pub mod trace;

pub use self::{
    link::{EthernetLink, LinkDetail, LinkId},
    mac::{Interface, InterfaceId, MacTimer},
    measure::Bandwidth,
    node::{Node, NodeId},
    packet::{MacAddr, Packet, PacketBuilder, PduHeader},
    scheduler::{EventId, Scheduler},
    simulation::{AttachError, Delivery, Event, LinkBuilder, NodeBuilder, Simulation},
    stats::{InterfaceStats, SimStats},
    time::SimTime,
    trace::{
        AddrFormat, ProtocolId, TraceBuffer, TraceDetail, TraceEntity, TraceStatus, TraceStream,
    },
};

#[test]
fn simple() {
    let mut simulation = Simulation::with_trace(TraceStream::closed());

    let n0 = simulation.new_node().build();
    let n1 = simulation.new_node().build();
    let bus = simulation.new_link().build();

    let i0 = simulation.attach(n0, bus).unwrap();
    let i1 = simulation.attach(n1, bus).unwrap();

    let packet = Packet::builder().size(1_000).build().unwrap();
    let dst = simulation.interface(i1).mac();
    simulation.schedule_send(0.0, i0, packet, dst);

    let mut packet_received = false;
    simulation.run_with(None, |_| packet_received = true);

    assert!(packet_received);
}
