use crate::measure::Bandwidth;

/// Default [`Bandwidth`]
///
/// This is the default value used for an ethernet link when none is
/// configured: classic 10mbps shared ethernet.
///
/// ```
/// # use ethersim_core::defaults::*;
/// assert_eq!(
///     DEFAULT_BANDWIDTH.to_string(),
///     "10mbps"
/// );
/// ```
///
pub const DEFAULT_BANDWIDTH: Bandwidth = Bandwidth::new(10_000_000);

/// Default interface queue depth, in packets.
///
/// An interface holds at most this many pending outbound packets. A
/// packet requeued into a full queue is dropped, reported through the
/// trace fabric.
///
/// See [`LinkBuilder::set_queue_capacity`] for more details
///
/// [`LinkBuilder::set_queue_capacity`]: crate::simulation::LinkBuilder::set_queue_capacity
///
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default seed for the per-interface backoff generators.
///
/// Each interface derives its own seed from the simulation's base seed
/// and its attachment index, so a run is reproducible bit for bit.
pub const DEFAULT_SEED: u64 = 0x45746865_72136963;

/// Default field width of the trace time column (`%7.3f`).
pub const DEFAULT_TIME_WIDTH: usize = 7;

/// Default precision of the trace time column (`%7.3f`).
pub const DEFAULT_TIME_PRECISION: usize = 3;
