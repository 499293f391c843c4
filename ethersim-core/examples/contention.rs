//! Two stations contending for a 10mbps bus.
//!
//! Both enqueue a frame at t=0; the trace on standard output shows the
//! collision, the jam and the randomized backoff resolving it.

use ethersim_core::{Packet, Simulation, TraceEntity, TraceStatus};

fn main() -> anyhow::Result<()> {
    let mut simulation = Simulation::new();
    simulation
        .trace_mut()
        .set_status(TraceEntity::Layer(2), TraceStatus::Enabled);

    let n0 = simulation.new_node().build();
    let n1 = simulation.new_node().build();
    let bus = simulation
        .new_link()
        .set_bandwidth("10mbps".parse()?)
        .build();

    let i0 = simulation.attach(n0, bus)?;
    let i1 = simulation.attach(n1, bus)?;

    let mac0 = simulation.interface(i0).mac();
    let mac1 = simulation.interface(i1).mac();

    simulation.schedule_send(0.0, i0, Packet::builder().size(1_000).build()?, mac1);
    simulation.schedule_send(0.0, i1, Packet::builder().size(1_000).build()?, mac0);

    let mut deliveries = Vec::new();
    simulation.run_with(None, |delivery| deliveries.push(delivery));

    println!();
    for delivery in &deliveries {
        println!(
            "N{node} received {packet} at {time:.6}s",
            node = delivery.node,
            packet = delivery.packet,
            time = delivery.time.as_secs(),
        );
    }

    let stats = simulation.stats();
    println!(
        "{collisions} collision(s) on the bus, {delivered} frame(s) delivered",
        collisions = stats.total_collisions(),
        delivered = stats.total_deliveries(),
    );

    Ok(())
}
