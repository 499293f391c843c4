/*!
# The ethernet MAC

Per-interface CSMA/CD state machine with binary exponential backoff.

Each [`Interface`] is one endpoint on a shared bus. It never touches its
peers directly: every cross-interface effect — the first bit of a frame
reaching a listener, the medium clearing after a collision jam — travels
as a future-dated event through the [`Scheduler`], delayed by the link's
propagation model. Self-timers (retransmission, the channel-acquired
watchdog, end of own transmission) are tracked in a small table with at
most one outstanding timer per kind, so cancellation is O(1) and
re-arming cannot leak duplicates.

All protocol constants are in bit times: divide by the link bandwidth to
get seconds.

[`Scheduler`]: crate::scheduler::Scheduler
*/

mod id;

pub use self::id::InterfaceId;

use crate::{
    geo::Location,
    link::LinkId,
    measure::Bandwidth,
    node::NodeId,
    packet::{MacAddr, Packet, PduHeader, ETHERTYPE_IPV4},
    scheduler::{EventId, Scheduler},
    simulation::Event,
    time::SimTime,
    trace::{ProtocolId, TraceSource, TraceStream},
};
use rand_chacha::ChaChaRng;
use rand_core::{RngCore as _, SeedableRng as _};
use std::collections::{HashMap, VecDeque};

/// Initial contention window ceiling, in slot units.
pub const INITIAL_BACKOFF: u64 = 1;
/// The canonical contention slot, in bit times (51.2µs at 10mbps).
pub const SLOT_TIME: u64 = 512;
/// Ceiling of the contention window, in slot units.
pub const BACKOFF_LIMIT: u64 = 1024;
/// Transmission attempts before a frame is dropped.
pub const ATTEMPT_LIMIT: u32 = 16;
/// Jam period after collision detection, in bit times.
pub const JAM_TIME: u64 = 32;
/// Minimum idle period between frames, in bit times.
pub const INTER_FRAME_GAP: u64 = 96;

/// The kinds of self-timer an interface can have outstanding.
///
/// At most one timer per kind is pending at any instant; the table maps
/// each kind to its scheduler handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacTimer {
    /// Re-attempt transmission of the head of the queue.
    Retransmit,
    /// Watchdog declaring the channel acquired without collision.
    ChanAcq,
    /// End of our own transmission; triggers delivery to the peers.
    Receive,
}

/// A listener on the bus, with the one-way signal travel time to it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Peer {
    pub interface: InterfaceId,
    pub delay: f64,
}

/// Packet and drop counters of one interface.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub packets_sent: u64,
    pub collisions: u64,
    pub backoffs: u64,
    pub queue_drops: u64,
    pub down_drops: u64,
    pub deliveries: u64,
}

/// One MAC endpoint on a shared ethernet bus.
///
/// Owns the carrier-sense state, the binary exponential backoff state,
/// the pending packet queue and the self-timer table. Constructed by
/// [`Simulation::attach`]; driven entirely by scheduler events.
///
/// [`Simulation::attach`]: crate::simulation::Simulation::attach
pub struct Interface {
    id: InterfaceId,
    node: NodeId,
    link: LinkId,
    mac: MacAddr,
    protocol: ProtocolId,

    bandwidth: Bandwidth,
    location: Option<Location>,
    rx_own_broadcast: bool,
    peers: Vec<Peer>,
    /// Upper bound on one-way bus propagation towards any peer.
    max_wait_time: f64,

    /// When the channel, as observed locally, next becomes idle.
    /// [`SimTime::UNKNOWN`] while a sender's end time is not known.
    busy_end_time: SimTime,
    /// Remote transmitters currently heard; rests at 1 when quiet.
    busy_count: i32,
    /// When our own current transmission ends; `== now` if none.
    tx_finish_time: SimTime,
    /// Earliest time we may attempt to transmit again.
    hold_time: SimTime,
    /// Cached delta used to arm the retransmit self-timer.
    rx_time: f64,
    /// Current contention window ceiling, in slot units.
    max_back_off: u64,
    /// Last computed backoff delay, seconds.
    back_off_timer: f64,
    last_packet_sent: Option<Packet>,
    bcast: bool,
    collision: bool,

    seed: u64,
    rng: ChaChaRng,
    queue: VecDeque<Packet>,
    queue_capacity: usize,
    timers: HashMap<MacTimer, EventId>,

    pub(crate) counters: Counters,
}

impl Interface {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: InterfaceId,
        node: NodeId,
        link: LinkId,
        mac: MacAddr,
        bandwidth: Bandwidth,
        location: Option<Location>,
        rx_own_broadcast: bool,
        queue_capacity: usize,
        seed: u64,
    ) -> Self {
        Self {
            id,
            node,
            link,
            mac,
            protocol: ProtocolId::new(id.value()),
            bandwidth,
            location,
            rx_own_broadcast,
            peers: Vec::new(),
            max_wait_time: 0.0,
            busy_end_time: SimTime::ZERO,
            busy_count: 1,
            tx_finish_time: SimTime::ZERO,
            hold_time: SimTime::ZERO,
            rx_time: 0.0,
            max_back_off: INITIAL_BACKOFF,
            back_off_timer: 0.0,
            last_packet_sent: None,
            bcast: false,
            collision: false,
            seed,
            rng: ChaChaRng::seed_from_u64(seed),
            queue: VecDeque::new(),
            queue_capacity,
            timers: HashMap::new(),
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// The interface's medium access address.
    #[inline]
    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    /// The serialisation rate, inherited from the link.
    #[inline]
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Position on the plane; `Some` on full-detail links.
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Current contention window ceiling, in slot units.
    pub fn max_back_off(&self) -> u64 {
        self.max_back_off
    }

    /// Whether a collision backoff is in progress.
    pub fn in_collision(&self) -> bool {
        self.collision
    }

    /// Pending outbound packets.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Identity used for trace status and detail lookups.
    pub fn trace_source(&self) -> TraceSource {
        TraceSource {
            node: self.node,
            protocol: self.protocol,
            layer: 2,
            tag: "eth",
        }
    }

    pub(crate) fn set_peers(&mut self, peers: Vec<Peer>) {
        self.max_wait_time = peers.iter().map(|peer| peer.delay).fold(0.0, f64::max);
        self.peers = peers;
    }

    /// Uniform sample on `[0, 1)` from the interface's own generator.
    fn uniform01(&mut self) -> f64 {
        let bits = self.rng.next_u64();
        (bits as f64) * (1.0 / (u64::MAX as f64 + 1.0))
    }

    // ------------------------------------------------------------------
    // timer table
    // ------------------------------------------------------------------

    fn timer_pending(&self, kind: MacTimer) -> bool {
        self.timers.contains_key(&kind)
    }

    /// Arm a self-timer `delay` seconds from now.
    ///
    /// A non-finite delay means "no deadline is known yet" (the hold time
    /// depends on a busy end that is itself unknown); the timer is left
    /// unarmed and the next medium-clear event re-arms it.
    fn arm_timer(&mut self, scheduler: &mut Scheduler<Event>, kind: MacTimer, delay: f64) {
        if !delay.is_finite() {
            return;
        }

        let event = match kind {
            MacTimer::Retransmit => Event::Retransmit(self.id),
            MacTimer::ChanAcq => Event::ChannelAcquired(self.id),
            MacTimer::Receive => Event::TxComplete(self.id),
        };
        let handle = scheduler.schedule(delay, event);
        if let Some(stale) = self.timers.insert(kind, handle) {
            scheduler.cancel(stale);
        }
    }

    /// Cancel a self-timer; idempotent, returns whether one was pending.
    fn cancel_timer(&mut self, scheduler: &mut Scheduler<Event>, kind: MacTimer) -> bool {
        match self.timers.remove(&kind) {
            Some(handle) => scheduler.cancel(handle),
            None => false,
        }
    }

    /// Forget the table entry of a timer that is firing right now, so a
    /// cancel from inside the callback is a no-op.
    pub(crate) fn timer_fired(&mut self, kind: MacTimer) {
        self.timers.remove(&kind);
    }

    // ------------------------------------------------------------------
    // carrier sense
    // ------------------------------------------------------------------

    /// Consult the locally observed medium state.
    ///
    /// Returns `true` when the channel is idle and a transmission may
    /// start. On `false`, `rx_time` holds the delay after which sensing
    /// is worth repeating: the residual of our own transmission plus
    /// inter-frame gap (or backoff hold), or the remainder of a remote
    /// transmission.
    pub(crate) fn sense_channel(&mut self, now: SimTime) -> bool {
        if now < self.tx_finish_time || now < self.hold_time {
            self.rx_time = self.tx_finish_time.max(self.hold_time) - now;
            return false;
        }

        if now < self.busy_end_time {
            self.rx_time = self.busy_end_time - now;
            return false;
        }

        self.collision = false;
        true
    }

    // ------------------------------------------------------------------
    // transmit path
    // ------------------------------------------------------------------

    /// Attempt to transmit `packet`, or the head of the queue.
    ///
    /// Counts the attempt against the cap, senses the channel, and either
    /// starts the transmission (first bit scheduled towards every peer,
    /// own completion timer armed, channel-acquired watchdog armed) or
    /// backs off (packet requeued at the tail, retransmit timer armed for
    /// when the medium is expected free).
    pub(crate) fn retransmit(
        &mut self,
        scheduler: &mut Scheduler<Event>,
        trace: &mut TraceStream,
        packet: Option<Packet>,
    ) {
        let Some(mut packet) = packet.or_else(|| self.queue.pop_front()) else {
            return;
        };

        let now = scheduler.now();
        let source = self.trace_source();

        if packet.bump_retx_count() > ATTEMPT_LIMIT {
            trace.write_trace(now, &source, Some("drp"), None, Some(&packet), "L2-QD");
            self.counters.queue_drops += 1;
            drop(packet);
            if !self.queue.is_empty() {
                self.retransmit(scheduler, trace, None);
            }
            return;
        }

        let attempt = format!("L2-RA {}", packet.retx_count());
        trace.write_trace(now, &source, Some("snd"), None, Some(&packet), &attempt);

        if self.sense_channel(now) {
            let size = packet.size();
            for peer in &self.peers {
                scheduler.schedule(
                    peer.delay,
                    Event::FirstBit {
                        interface: peer.interface,
                        size,
                    },
                );
            }

            let tx_time = self.bandwidth.transmission_time(size);
            self.tx_finish_time = now + tx_time;
            self.hold_time = self.tx_finish_time + self.bandwidth.bit_time(INTER_FRAME_GAP);
            self.rx_time = self.hold_time - now;
            self.bcast = packet.is_broadcast();

            if !self.timer_pending(MacTimer::Retransmit) && !self.queue.is_empty() {
                self.arm_timer(scheduler, MacTimer::Retransmit, self.rx_time);
            }

            // hand the frame to the wire: our own completion timer is the
            // downstream transmitter delivering copies to the peers
            self.last_packet_sent = Some(packet);
            self.arm_timer(scheduler, MacTimer::Receive, tx_time);
            self.counters.packets_sent += 1;

            if !self.timer_pending(MacTimer::ChanAcq) {
                self.arm_timer(scheduler, MacTimer::ChanAcq, 2.0 * self.max_wait_time);
            }
        } else {
            if !self.timer_pending(MacTimer::Retransmit) {
                self.arm_timer(scheduler, MacTimer::Retransmit, self.rx_time);
            }

            trace.write_trace(now, &source, Some("bck"), None, Some(&packet), "L2-B");
            self.counters.backoffs += 1;

            // requeued at the tail; the attempt did not occur so the
            // counter is taken back after the enqueue
            if self.enqueue(trace, now, packet) {
                if let Some(queued) = self.queue.back_mut() {
                    queued.decrement_retx_count();
                }
            }
        }
    }

    /// Bounded tail enqueue; `false` when the queue is full.
    ///
    /// A frame that does not fit is a simulated drop, not an error: it is
    /// reported as an `L2-QD` record and the simulation continues.
    fn enqueue(&mut self, trace: &mut TraceStream, now: SimTime, packet: Packet) -> bool {
        if self.queue.len() >= self.queue_capacity {
            let source = self.trace_source();
            trace.write_trace(now, &source, Some("drp"), None, Some(&packet), "L2-QD");
            self.counters.queue_drops += 1;
            return false;
        }
        self.queue.push_back(packet);
        true
    }

    /// A fresh higher-layer send.
    ///
    /// Encapsulates the packet with an ethernet header and attempts
    /// transmission immediately. A down interface drops the packet with
    /// an `L2-ID` trace record.
    pub(crate) fn send(
        &mut self,
        scheduler: &mut Scheduler<Event>,
        trace: &mut TraceStream,
        mut packet: Packet,
        dst: MacAddr,
        up: bool,
    ) {
        let now = scheduler.now();

        if !up {
            let source = self.trace_source();
            trace.write_trace(now, &source, Some("drp"), None, Some(&packet), "L2-ID");
            self.counters.down_drops += 1;
            return;
        }

        packet.set_retx_count(0);
        packet.push_header(PduHeader::Ethernet {
            src: self.mac,
            dst,
            ethertype: ETHERTYPE_IPV4,
        });

        self.cancel_timer(scheduler, MacTimer::Retransmit);
        self.retransmit(scheduler, trace, Some(packet));
    }

    // ------------------------------------------------------------------
    // listen path
    // ------------------------------------------------------------------

    /// The first bit of a peer's frame reaches this interface.
    ///
    /// Three disjoint cases: we are transmitting (collision), the medium
    /// was already busy (an overlapping second sender, end now unknown),
    /// or ordinary passing traffic.
    pub(crate) fn first_bit_received(
        &mut self,
        scheduler: &mut Scheduler<Event>,
        trace: &mut TraceStream,
        size: u64,
    ) {
        let now = scheduler.now();

        if now < self.tx_finish_time {
            // another first bit during the same collision
            if self.collision {
                return;
            }
            self.collision = true;

            self.cancel_timer(scheduler, MacTimer::Receive);
            let source = self.trace_source();
            trace.write_trace(now, &source, Some("col"), None, None, "L2-C");
            self.counters.collisions += 1;
            self.cancel_timer(scheduler, MacTimer::ChanAcq);

            // the jam: tell every listener to take this sender off the
            // medium once the fragment has propagated to it
            for peer in &self.peers {
                scheduler.schedule(peer.delay, Event::Clear(peer.interface));
            }

            // truncate our own transmission
            self.tx_finish_time = now;

            self.max_back_off = (self.max_back_off * 2).min(BACKOFF_LIMIT);
            let slot = self.bandwidth.bit_time(SLOT_TIME);
            self.back_off_timer = slot * (self.uniform01() * self.max_back_off as f64).ceil();
            self.hold_time =
                self.tx_finish_time + self.back_off_timer + self.bandwidth.bit_time(JAM_TIME);

            if let Some(packet) = self.last_packet_sent.take() {
                self.enqueue(trace, now, packet);
            }

            self.cancel_timer(scheduler, MacTimer::Retransmit);
            let delay = self.hold_time - now;
            self.arm_timer(scheduler, MacTimer::Retransmit, delay);
        } else if self.busy_end_time.is_unknown() || now < self.busy_end_time {
            // a second transmitter overlaps the one we are hearing; the
            // medium stays busy until the clears come in
            self.busy_count += 1;
            self.busy_end_time = SimTime::UNKNOWN;
        } else {
            let tx_time = self.bandwidth.transmission_time(size);
            self.busy_end_time = now + tx_time;
            self.hold_time = self.busy_end_time + self.bandwidth.bit_time(INTER_FRAME_GAP);

            if !self.queue.is_empty() && !self.timer_pending(MacTimer::Retransmit) {
                self.arm_timer(scheduler, MacTimer::Retransmit, self.hold_time - now);
            }
        }
    }

    /// A colliding sender's jam has propagated past this interface.
    ///
    /// Takes one transmitter off the busy count. The count rests at 1:
    /// when the decrement would reach zero the medium is declared idle
    /// as of now and the count floors back to its resting value.
    pub(crate) fn clear_channel(&mut self, scheduler: &mut Scheduler<Event>) {
        let now = scheduler.now();

        self.busy_count -= 1;
        if self.busy_count <= 0 {
            self.busy_count = 1;
            self.busy_end_time = now;
        }

        if !self.collision {
            self.hold_time = self.busy_end_time + self.bandwidth.bit_time(JAM_TIME);
        }

        self.cancel_timer(scheduler, MacTimer::Retransmit);
        // a clear propagating in from a distant peer can land after the
        // hold has already expired; retry immediately then
        let delay = (self.hold_time - now).max(0.0);
        self.arm_timer(scheduler, MacTimer::Retransmit, delay);
    }

    /// The channel-acquired watchdog: no collision happened within a bus
    /// round trip of the transmission start, so contention is over.
    pub(crate) fn channel_acquired(&mut self) {
        self.max_back_off = INITIAL_BACKOFF;
    }

    /// Our own transmission reached its last bit without collision.
    ///
    /// Deliver one copy of the frame to every peer after its propagation
    /// delay; a broadcast sender hears its own copy when the link is
    /// configured to loop broadcasts back.
    pub(crate) fn transmission_complete(&mut self, scheduler: &mut Scheduler<Event>) {
        let Some(packet) = self.last_packet_sent.take() else {
            return;
        };

        for peer in &self.peers {
            scheduler.schedule(
                peer.delay,
                Event::Deliver {
                    interface: peer.interface,
                    packet: packet.clone(),
                },
            );
        }

        if self.bcast && self.rx_own_broadcast {
            scheduler.schedule(
                0.0,
                Event::Deliver {
                    interface: self.id,
                    packet,
                },
            );
        }
    }

    /// Return to the post-construction state.
    ///
    /// Clears the queue, the timer table and every dynamic MAC variable,
    /// and reseeds the generator so a reset run replays identically.
    pub(crate) fn reset(&mut self) {
        self.busy_end_time = SimTime::ZERO;
        self.busy_count = 1;
        self.tx_finish_time = SimTime::ZERO;
        self.hold_time = SimTime::ZERO;
        self.rx_time = 0.0;
        self.max_back_off = INITIAL_BACKOFF;
        self.back_off_timer = 0.0;
        self.last_packet_sent = None;
        self.bcast = false;
        self.collision = false;
        self.rng = ChaChaRng::seed_from_u64(self.seed);
        self.queue.clear();
        self.timers.clear();
        self.counters = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{TraceBuffer, TraceEntity, TraceStatus};

    fn interface() -> Interface {
        Interface::new(
            InterfaceId::ZERO,
            NodeId::ZERO,
            LinkId::ZERO,
            MacAddr::locally_administered(0),
            "10mbps".parse().unwrap(),
            None,
            false,
            crate::defaults::DEFAULT_QUEUE_CAPACITY,
            42,
        )
    }

    fn harness() -> (Interface, Scheduler<Event>, TraceStream, TraceBuffer) {
        let (mut trace, buffer) = TraceStream::to_shared_buffer();
        trace.set_status(TraceEntity::Layer(2), TraceStatus::Enabled);
        (interface(), Scheduler::new(), trace, buffer)
    }

    fn packet(size: u64) -> Packet {
        Packet::builder().size(size).build().unwrap()
    }

    #[test]
    fn sense_idle_when_quiescent() {
        let (mut iface, scheduler, ..) = harness();

        assert!(iface.sense_channel(scheduler.now()));
    }

    #[test]
    fn sense_busy_during_own_transmission() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.retransmit(&mut scheduler, &mut trace, Some(packet(1_000)));

        // 800µs of frame plus the inter frame gap
        assert!(!iface.sense_channel(scheduler.now()));
        assert!((iface.rx_time - 809.6e-6).abs() < 1e-12);
    }

    #[test]
    fn sense_busy_on_remote_traffic() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);

        assert_eq!(iface.busy_end_time, SimTime::from_secs(800e-6));
        assert!(!iface.sense_channel(scheduler.now()));
    }

    #[test]
    fn transmit_on_idle_channel() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        iface.retransmit(&mut scheduler, &mut trace, Some(packet(1_000)));

        assert_eq!(iface.tx_finish_time, SimTime::from_secs(800e-6));
        assert!((iface.hold_time.as_secs() - 809.6e-6).abs() < 1e-12);
        assert!(iface.last_packet_sent.is_some());
        assert!(iface.timer_pending(MacTimer::Receive));
        assert!(iface.timer_pending(MacTimer::ChanAcq));
        // nothing queued behind it: no retransmit timer
        assert!(!iface.timer_pending(MacTimer::Retransmit));

        assert_eq!(buffer.count("L2-RA 1"), 1);
        assert_eq!(buffer.count("L2-B"), 0);
    }

    #[test]
    fn busy_path_requeues_at_tail_and_takes_the_attempt_back() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        // remote traffic holds the medium
        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);

        let mut head = packet(64);
        head.set_retx_count(3);
        iface.retransmit(&mut scheduler, &mut trace, Some(head));

        assert_eq!(buffer.count("L2-RA 4"), 1);
        assert_eq!(buffer.count("L2-B"), 1);

        // requeued at the tail with the attempt taken back
        assert_eq!(iface.queue_len(), 1);
        assert_eq!(iface.queue.back().unwrap().retx_count(), 3);
        assert!(iface.timer_pending(MacTimer::Retransmit));
        assert!(iface.last_packet_sent.is_none());
    }

    #[test]
    fn overflowing_the_queue_drops_with_a_trace_record() {
        let (_, mut scheduler, mut trace, buffer) = harness();
        let mut iface = Interface::new(
            InterfaceId::ZERO,
            NodeId::ZERO,
            LinkId::ZERO,
            MacAddr::locally_administered(0),
            "10mbps".parse().unwrap(),
            None,
            false,
            0,
            42,
        );

        // remote traffic holds the medium; the busy-path requeue has
        // nowhere to put the frame
        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);
        iface.retransmit(&mut scheduler, &mut trace, Some(packet(64)));

        assert_eq!(buffer.count("L2-B"), 1);
        assert_eq!(buffer.count("L2-QD"), 1);
        assert_eq!(iface.queue_len(), 0);
        assert_eq!(iface.counters.queue_drops, 1);
    }

    #[test]
    fn drops_after_attempt_limit_and_advances_the_queue() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        let mut exhausted = packet(64);
        exhausted.set_retx_count(ATTEMPT_LIMIT);
        iface.queue.push_back(packet(1_000));

        iface.retransmit(&mut scheduler, &mut trace, Some(exhausted));

        assert_eq!(buffer.count("L2-QD"), 1);
        // the next packet took the medium
        assert_eq!(buffer.count("L2-RA 1"), 1);
        assert_eq!(iface.queue_len(), 0);
        assert!(iface.last_packet_sent.is_some());
        assert_eq!(iface.counters.queue_drops, 1);
    }

    #[test]
    fn collision_doubles_the_window_up_to_the_limit() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        for k in 1..=12u32 {
            // pretend a transmission is in flight, then hear a first bit
            iface.tx_finish_time = scheduler.now() + 1.0;
            iface.last_packet_sent = Some(packet(64));
            iface.collision = false;

            iface.first_bit_received(&mut scheduler, &mut trace, 64);

            let expected = (INITIAL_BACKOFF << k).min(BACKOFF_LIMIT);
            assert_eq!(iface.max_back_off, expected, "after collision {k}");
            assert!(iface.tx_finish_time == scheduler.now());
            assert!(iface.hold_time >= iface.tx_finish_time);
        }

        assert_eq!(buffer.count("L2-C"), 12);
    }

    #[test]
    fn second_first_bit_in_a_collision_is_ignored() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        iface.tx_finish_time = scheduler.now() + 1.0;
        iface.last_packet_sent = Some(packet(64));

        iface.first_bit_received(&mut scheduler, &mut trace, 64);
        let window = iface.max_back_off;

        // still within tx_finish_time? no: collision truncated it. force
        // the transmitting state again without clearing the flag
        iface.tx_finish_time = scheduler.now() + 1.0;
        iface.first_bit_received(&mut scheduler, &mut trace, 64);

        assert_eq!(iface.max_back_off, window);
        assert_eq!(buffer.count("L2-C"), 1);
    }

    #[test]
    fn backoff_delay_is_a_whole_number_of_slots() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.tx_finish_time = scheduler.now() + 1.0;
        iface.first_bit_received(&mut scheduler, &mut trace, 64);

        let slot = iface.bandwidth.bit_time(SLOT_TIME);
        let slots = iface.back_off_timer / slot;

        assert!(slots.fract() == 0.0, "backoff was {slots} slots");
        assert!(slots <= iface.max_back_off as f64);
        assert_eq!(
            iface.hold_time,
            iface.tx_finish_time + iface.back_off_timer + iface.bandwidth.bit_time(JAM_TIME)
        );
    }

    #[test]
    fn overlapping_senders_make_the_busy_end_unknown() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);
        assert_eq!(iface.busy_count, 1);

        // second sender while the first is still on the wire
        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);

        assert_eq!(iface.busy_count, 2);
        assert!(iface.busy_end_time.is_unknown());
        assert!(!iface.sense_channel(scheduler.now()));
    }

    #[test]
    fn clear_floors_the_busy_count_at_one() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);
        iface.first_bit_received(&mut scheduler, &mut trace, 1_000);
        assert_eq!(iface.busy_count, 2);

        iface.clear_channel(&mut scheduler);
        assert_eq!(iface.busy_count, 1);
        assert!(iface.busy_end_time.is_unknown());

        iface.clear_channel(&mut scheduler);
        assert_eq!(iface.busy_count, 1);
        assert_eq!(iface.busy_end_time, scheduler.now());
        // free to hold off one jam time past the clear
        assert_eq!(
            iface.hold_time,
            scheduler.now() + iface.bandwidth.bit_time(JAM_TIME)
        );
        assert!(iface.timer_pending(MacTimer::Retransmit));
    }

    #[test]
    fn channel_acquired_resets_the_window() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.tx_finish_time = scheduler.now() + 1.0;
        iface.first_bit_received(&mut scheduler, &mut trace, 64);
        assert_eq!(iface.max_back_off, 2 * INITIAL_BACKOFF);

        iface.channel_acquired();
        assert_eq!(iface.max_back_off, INITIAL_BACKOFF);
    }

    #[test]
    fn send_on_a_down_interface_drops() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        iface.send(
            &mut scheduler,
            &mut trace,
            packet(64),
            MacAddr::BROADCAST,
            false,
        );

        assert_eq!(buffer.count("L2-ID"), 1);
        assert_eq!(iface.counters.down_drops, 1);
        assert!(iface.last_packet_sent.is_none());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn send_encapsulates_and_transmits() {
        let (mut iface, mut scheduler, mut trace, buffer) = harness();

        let dst = MacAddr::locally_administered(9);
        iface.send(&mut scheduler, &mut trace, packet(64), dst, true);

        let sent = iface.last_packet_sent.as_ref().unwrap();
        assert_eq!(sent.src(), Some(iface.mac()));
        assert_eq!(sent.dst(), Some(dst));
        assert_eq!(sent.retx_count(), 1);
        assert_eq!(buffer.count("L2-RA 1"), 1);
    }

    #[test]
    fn at_most_one_timer_per_kind() {
        let (mut iface, mut scheduler, ..) = harness();

        iface.arm_timer(&mut scheduler, MacTimer::Retransmit, 1.0);
        iface.arm_timer(&mut scheduler, MacTimer::Retransmit, 2.0);

        assert_eq!(scheduler.len(), 1);

        assert!(iface.cancel_timer(&mut scheduler, MacTimer::Retransmit));
        assert!(!iface.cancel_timer(&mut scheduler, MacTimer::Retransmit));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unknown_hold_leaves_the_timer_unarmed() {
        let (mut iface, mut scheduler, ..) = harness();

        iface.hold_time = SimTime::UNKNOWN;
        iface.arm_timer(&mut scheduler, MacTimer::Retransmit, f64::INFINITY);

        assert!(!iface.timer_pending(MacTimer::Retransmit));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn reset_returns_to_the_post_construction_state() {
        let (mut iface, mut scheduler, mut trace, _) = harness();

        iface.retransmit(&mut scheduler, &mut trace, Some(packet(1_000)));
        iface.queue.push_back(packet(64));
        let draw_before_reset = {
            iface.reset();
            iface.uniform01()
        };

        assert_eq!(iface.queue_len(), 0);
        assert_eq!(iface.max_back_off, INITIAL_BACKOFF);
        assert_eq!(iface.tx_finish_time, SimTime::ZERO);
        assert_eq!(iface.counters.packets_sent, 0);

        // the generator replays from the seed
        iface.reset();
        assert_eq!(iface.uniform01(), draw_before_reset);
    }
}
