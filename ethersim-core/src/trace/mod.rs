/*!
# The trace fabric

Structured, hierarchical event sink for the simulation. Every observable
MAC action is reported here as one record; the stream decides whether to
drop it (per-entity enable status), what to include (per-entity detail)
and how to lay it out (one line per simulation time and node, records
sharing the prefix collapsed onto the same line).

A record looks like:

```text
  0.000 N0 [eth] [snd] [1000b 02:00:00:00:00:00>02:00:00:00:00:01] L2-RA 1
```

with the bracketed fields subject to the detail filter. The known event
codes are `L2-RA <n>` (retransmit attempt), `L2-C` (collision), `L2-B`
(backoff), `L2-QD` (queue drop after the attempt cap) and `L2-ID`
(interface-down drop).

Dropping a packet for simulated reasons is *not* an error: the trace
record is the only report and the simulation continues. Writing to a
closed stream is a silent drop too.
*/

use crate::{defaults, node::NodeId, packet::Packet, time::SimTime};
use std::{collections::HashMap, fmt, io, net::Ipv4Addr};

/// The identifier of a protocol instance for trace lookups.
///
/// Each MAC interface is one protocol instance; statuses and detail can
/// be set for the instance itself, for the node that owns it, or for the
/// whole protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolId(u64);

impl ProtocolId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anything a trace status or detail can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEntity {
    Node(NodeId),
    Protocol(ProtocolId),
    Layer(u8),
}

/// Per-entity enable status.
///
/// `Default` defers to the next entity in the resolution order; if every
/// entity defers, the stream's own default applies (disabled unless
/// changed with [`TraceStream::set_default_enabled`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceStatus {
    Enabled,
    Disabled,
    #[default]
    Default,
}

/// Which optional record fields are included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceDetail {
    /// Every optional field.
    All,
    /// Only the named fields: `"protocol"`, `"action"`, `"packet"`.
    Fields(Vec<String>),
}

impl TraceDetail {
    fn allows(&self, field: &str) -> bool {
        match self {
            TraceDetail::All => true,
            TraceDetail::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }
}

/// How `flow` addresses are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddrFormat {
    /// Dotted quads, `10.0.0.1`.
    #[default]
    Dotted,
    /// The raw 32-bit value in decimal.
    Numeric,
}

/// Identity of the component writing a record.
///
/// Carried by each interface so that a single value travels to
/// [`TraceStream::write_trace`] per call.
#[derive(Debug, Clone, Copy)]
pub struct TraceSource {
    pub node: NodeId,
    pub protocol: ProtocolId,
    pub layer: u8,
    pub tag: &'static str,
}

/// A structured event sink with per-entity filtering.
///
/// The stream tracks a current node and packet cursor, a column counter
/// and the time of the last record, collapsing records that share the
/// `(time, node)` prefix onto a single line. See the [module](self)
/// documentation for the record layout.
pub struct TraceStream {
    sink: Option<Box<dyn io::Write>>,

    status: HashMap<TraceEntity, TraceStatus>,
    detail: HashMap<TraceEntity, TraceDetail>,
    default_enabled: bool,

    node: Option<NodeId>,
    packet_recorded: bool,
    col_index: usize,
    last_log_time: SimTime,

    time_width: usize,
    time_precision: usize,
    addr_format: AddrFormat,
}

impl TraceStream {
    /// A stream writing to the given sink.
    pub fn new(sink: Box<dyn io::Write>) -> Self {
        Self {
            sink: Some(sink),
            status: HashMap::new(),
            detail: HashMap::new(),
            default_enabled: false,
            node: None,
            packet_recorded: false,
            col_index: 0,
            last_log_time: SimTime::ZERO,
            time_width: defaults::DEFAULT_TIME_WIDTH,
            time_precision: defaults::DEFAULT_TIME_PRECISION,
            addr_format: AddrFormat::default(),
        }
    }

    /// The default stream: standard output.
    pub fn to_stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// A stream with no sink; every write is silently dropped.
    pub fn closed() -> Self {
        let mut stream = Self::new(Box::new(io::sink()));
        stream.sink = None;
        stream
    }

    /// A stream writing into a shared in-memory buffer.
    ///
    /// The returned [`TraceBuffer`] can be read while the stream is live,
    /// which is how tests assert on trace output.
    pub fn to_shared_buffer() -> (Self, TraceBuffer) {
        let buffer = TraceBuffer::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Whether records currently reach a sink.
    pub fn trace_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Drop the sink; subsequent writes are swallowed.
    pub fn close(&mut self) {
        self.sink = None;
    }

    /// Set the enable status for an entity.
    pub fn set_status(&mut self, entity: TraceEntity, status: TraceStatus) {
        self.status.insert(entity, status);
    }

    /// Set the detail filter for an entity.
    pub fn set_detail(&mut self, entity: TraceEntity, detail: TraceDetail) {
        self.detail.insert(entity, detail);
    }

    /// The status applied when every entity's status is `Default`.
    pub fn set_default_enabled(&mut self, enabled: bool) {
        self.default_enabled = enabled;
    }

    /// Width and precision of the time column (defaults to `%7.3f`).
    pub fn set_time_format(&mut self, width: usize, precision: usize) {
        self.time_width = width;
        self.time_precision = precision;
    }

    /// How `flow` addresses are rendered.
    pub fn set_addr_format(&mut self, format: AddrFormat) {
        self.addr_format = format;
    }

    /// Resolve the effective enable status for a record source.
    ///
    /// The first non-`Default` status among the node, the protocol
    /// instance and the layer wins, in that order.
    pub fn effective_status(&self, source: &TraceSource) -> bool {
        let entities = [
            TraceEntity::Node(source.node),
            TraceEntity::Protocol(source.protocol),
            TraceEntity::Layer(source.layer),
        ];

        for entity in entities {
            match self.status.get(&entity) {
                Some(TraceStatus::Enabled) => return true,
                Some(TraceStatus::Disabled) => return false,
                Some(TraceStatus::Default) | None => (),
            }
        }

        self.default_enabled
    }

    fn effective_detail(&self, source: &TraceSource) -> &TraceDetail {
        static DEFAULT_DETAIL: TraceDetail = TraceDetail::All;

        let entities = [
            TraceEntity::Protocol(source.protocol),
            TraceEntity::Node(source.node),
            TraceEntity::Layer(source.layer),
        ];

        for entity in entities {
            if let Some(detail) = self.detail.get(&entity) {
                return detail;
            }
        }

        &DEFAULT_DETAIL
    }

    /// Write one record.
    ///
    /// The record is dropped entirely when the resolved status disables
    /// the source or the stream is closed. Otherwise the optional fields
    /// pass through the detail filter and the result is laid out under
    /// the line discipline: records sharing the `(time, node)` prefix
    /// share a line, embedded newlines in `text` become spaces.
    pub fn write_trace(
        &mut self,
        now: SimTime,
        source: &TraceSource,
        action: Option<&str>,
        flow: Option<Ipv4Addr>,
        packet: Option<&Packet>,
        text: &str,
    ) {
        if self.sink.is_none() || !self.effective_status(source) {
            return;
        }

        // lazy newlines: time change, node cursor change, new packet while
        // one is already on the line
        if now != self.last_log_time {
            self.break_line();
            self.last_log_time = now;
        }
        if self.node != Some(source.node) {
            self.break_line();
            self.node = Some(source.node);
        }
        if packet.is_some() {
            if self.packet_recorded {
                self.break_line();
            }
            self.packet_recorded = true;
        }

        let detail = self.effective_detail(source).clone();

        let mut record = String::new();
        if detail.allows("protocol") {
            record.push_str(&format!("[{}] ", source.tag));
        }
        if let Some(action) = action {
            if detail.allows("action") {
                record.push_str(&format!("[{action}] "));
            }
        }
        if let Some(packet) = packet {
            if detail.allows("packet") {
                record.push_str(&format!("[{packet}] "));
            }
        }
        if let Some(flow) = flow {
            let formatted = match self.addr_format {
                AddrFormat::Dotted => format!("{flow} "),
                AddrFormat::Numeric => format!("{} ", u32::from(flow)),
            };
            record.push_str(&formatted);
        }
        for ch in text.chars() {
            record.push(if ch == '\n' { ' ' } else { ch });
        }

        if self.col_index > 0 {
            self.put_char(now, ' ');
        }
        for ch in record.chars() {
            self.put_char(now, ch);
        }
    }

    /// End the current line, if one is open.
    fn break_line(&mut self) {
        if self.col_index > 0 {
            self.write_raw("\n");
            self.col_index = 0;
            self.packet_recorded = false;
        }
    }

    fn put_char(&mut self, now: SimTime, ch: char) {
        if ch == '\n' {
            self.break_line();
            return;
        }

        if self.col_index == 0 {
            let uid = match self.node {
                Some(node) => node.uid() as i64,
                None => -1,
            };
            let prefix = format!(
                "{time:>width$.precision$} N{uid} ",
                time = now.as_secs(),
                width = self.time_width,
                precision = self.time_precision,
            );
            self.col_index += prefix.chars().count();
            self.write_raw(&prefix);
        }

        let mut buffer = [0u8; 4];
        self.col_index += 1;
        self.write_raw(ch.encode_utf8(&mut buffer));
    }

    fn write_raw(&mut self, s: &str) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if sink.write_all(s.as_bytes()).is_err() {
            // a failing sink degrades to a closed stream
            self.sink = None;
        }
    }

    /// Flush the sink and restart the line discipline at `now`.
    pub fn reset(&mut self, now: SimTime) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
        self.col_index = 0;
        self.node = None;
        self.packet_recorded = false;
        self.last_log_time = now;
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
    }
}

impl Default for TraceStream {
    fn default() -> Self {
        Self::to_stdout()
    }
}

impl fmt::Debug for TraceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceStream")
            .field("open", &self.sink.is_some())
            .field("node", &self.node)
            .field("col_index", &self.col_index)
            .finish_non_exhaustive()
    }
}

/// Shared in-memory sink for a [`TraceStream`].
#[derive(Clone, Default)]
pub struct TraceBuffer(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl TraceBuffer {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Number of records containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for TraceBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(node: u64, protocol: u64) -> TraceSource {
        TraceSource {
            node: NodeId::new(node),
            protocol: ProtocolId::new(protocol),
            layer: 2,
            tag: "eth",
        }
    }

    fn bare_stream() -> (TraceStream, TraceBuffer) {
        let (mut stream, buffer) = TraceStream::to_shared_buffer();
        stream.set_default_enabled(true);
        // only the text, no bracketed fields: predictable expected strings
        stream.set_detail(TraceEntity::Layer(2), TraceDetail::Fields(Vec::new()));
        (stream, buffer)
    }

    #[test]
    fn node_status_wins_over_protocol() {
        let (mut stream, buffer) = bare_stream();
        stream.set_default_enabled(false);

        let src = source(0, 0);
        stream.set_status(TraceEntity::Node(src.node), TraceStatus::Enabled);
        stream.set_status(TraceEntity::Protocol(src.protocol), TraceStatus::Disabled);

        stream.write_trace(SimTime::ZERO, &src, None, None, None, "visible");

        assert!(buffer.contents().contains("visible"));
    }

    #[test]
    fn protocol_status_wins_over_layer() {
        let (mut stream, buffer) = bare_stream();
        stream.set_default_enabled(false);

        let src = source(0, 0);
        stream.set_status(TraceEntity::Layer(2), TraceStatus::Enabled);
        stream.set_status(TraceEntity::Protocol(src.protocol), TraceStatus::Disabled);

        stream.write_trace(SimTime::ZERO, &src, None, None, None, "hidden");

        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn stream_default_is_disabled() {
        let (mut stream, buffer) = TraceStream::to_shared_buffer();

        stream.write_trace(SimTime::ZERO, &source(0, 0), None, None, None, "hidden");

        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn records_collapse_on_shared_prefix() {
        let (mut stream, buffer) = bare_stream();
        let src = source(0, 0);

        stream.write_trace(SimTime::ZERO, &src, None, None, None, "L2-RA 1");
        stream.write_trace(SimTime::ZERO, &src, None, None, None, "L2-B");

        assert_eq!(buffer.contents(), "  0.000 N0 L2-RA 1 L2-B");
    }

    #[test]
    fn time_change_breaks_the_line() {
        let (mut stream, buffer) = bare_stream();
        let src = source(0, 0);

        stream.write_trace(SimTime::ZERO, &src, None, None, None, "first");
        stream.write_trace(SimTime::from_millis(1), &src, None, None, None, "second");

        assert_eq!(buffer.contents(), "  0.000 N0 first\n  0.001 N0 second");
    }

    #[test]
    fn node_change_breaks_the_line() {
        let (mut stream, buffer) = bare_stream();

        stream.write_trace(SimTime::ZERO, &source(0, 0), None, None, None, "zero");
        stream.write_trace(SimTime::ZERO, &source(1, 1), None, None, None, "one");

        assert_eq!(buffer.contents(), "  0.000 N0 zero\n  0.000 N1 one");
    }

    #[test]
    fn second_packet_breaks_the_line() {
        let (mut stream, buffer) = bare_stream();
        let src = source(0, 0);
        let packet = Packet::builder().size(64).build().unwrap();

        stream.write_trace(SimTime::ZERO, &src, None, None, Some(&packet), "a");
        stream.write_trace(SimTime::ZERO, &src, None, None, Some(&packet), "b");

        assert_eq!(buffer.contents(), "  0.000 N0 a\n  0.000 N0 b");
    }

    #[test]
    fn embedded_newlines_become_spaces() {
        let (mut stream, buffer) = bare_stream();

        stream.write_trace(
            SimTime::ZERO,
            &source(0, 0),
            None,
            None,
            None,
            "multi\nline",
        );

        assert_eq!(buffer.contents(), "  0.000 N0 multi line");
    }

    #[test]
    fn detail_selects_fields() {
        let (mut stream, buffer) = TraceStream::to_shared_buffer();
        stream.set_default_enabled(true);
        let src = source(0, 0);

        stream.set_detail(
            TraceEntity::Protocol(src.protocol),
            TraceDetail::Fields(vec!["action".into()]),
        );

        let packet = Packet::builder().size(64).build().unwrap();
        stream.write_trace(
            SimTime::ZERO,
            &src,
            Some("snd"),
            None,
            Some(&packet),
            "L2-RA 1",
        );

        assert_eq!(buffer.contents(), "  0.000 N0 [snd] L2-RA 1");
    }

    #[test]
    fn full_detail_includes_everything() {
        let (mut stream, buffer) = TraceStream::to_shared_buffer();
        stream.set_default_enabled(true);
        let src = source(0, 0);

        let packet = Packet::builder().size(64).build().unwrap();
        stream.write_trace(
            SimTime::ZERO,
            &src,
            Some("snd"),
            Some(Ipv4Addr::new(10, 0, 0, 1)),
            Some(&packet),
            "L2-RA 1",
        );

        assert_eq!(
            buffer.contents(),
            "  0.000 N0 [eth] [snd] [64b] 10.0.0.1 L2-RA 1"
        );
    }

    #[test]
    fn numeric_addr_format() {
        let (mut stream, buffer) = bare_stream();
        stream.set_addr_format(AddrFormat::Numeric);

        stream.write_trace(
            SimTime::ZERO,
            &source(0, 0),
            None,
            Some(Ipv4Addr::new(0, 0, 0, 42)),
            None,
            "flow",
        );

        assert_eq!(buffer.contents(), "  0.000 N0 42 flow");
    }

    #[test]
    fn closed_stream_swallows_writes() {
        let mut stream = TraceStream::closed();
        assert!(!stream.trace_enabled());

        // does not panic, silently dropped
        stream.write_trace(SimTime::ZERO, &source(0, 0), None, None, None, "ignored");
    }

    #[test]
    fn close_mid_run() {
        let (mut stream, buffer) = bare_stream();
        let src = source(0, 0);

        stream.write_trace(SimTime::ZERO, &src, None, None, None, "kept");
        stream.close();
        stream.write_trace(SimTime::ZERO, &src, None, None, None, "dropped");

        assert_eq!(buffer.contents(), "  0.000 N0 kept");
    }

    #[test]
    fn reset_restarts_the_line_discipline() {
        let (mut stream, buffer) = bare_stream();
        let src = source(0, 0);

        stream.write_trace(SimTime::from_millis(2), &src, None, None, None, "before");
        stream.reset(SimTime::ZERO);
        stream.write_trace(SimTime::ZERO, &src, None, None, None, "after");

        // the reset line break is the caller's: the partial line stays as
        // written, the next record starts from a fresh prefix
        assert_eq!(buffer.contents(), "  0.002 N0 before  0.000 N0 after");
    }
}
