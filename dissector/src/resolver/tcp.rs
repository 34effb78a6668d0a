use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

// Segments with no SYN/PSH and a payload shorter than this are keep-alives or
// bare ACKs, they never open a flow on their own.
pub const NO_CONTENT_PAYLOAD: usize = 9;

/// Transport facts of one TCP segment, as seen by the flow tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub source: SocketAddr,
    pub destination: SocketAddr,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub syn: bool,
    pub ack: bool,
    pub push: bool,
    pub reset: bool,
    pub fin: bool,
    pub payload_length: usize,
}

impl Segment {
    pub fn is_no_content(&self) -> bool {
        self.ack && !self.syn && !self.push && self.payload_length < NO_CONTENT_PAYLOAD
    }

    /// Sequence number expected after this segment. SYN and FIN take one.
    pub fn next_sequence(&self) -> u32 {
        if self.syn || self.fin {
            self.sequence.wrapping_add(1)
        } else {
            self.sequence.wrapping_add(self.payload_length as u32)
        }
    }
}

/// Outcome of tracking one segment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpTrack {
    pub key: String,
    // Index of the sending stack inside the connection.
    pub direction: usize,
    pub is_dump: bool,
    pub miss_pre: bool,
}

/// One direction of a connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpStack {
    pub endpoint: String,
    pub sequence: Option<u32>,
    pub next: Option<u32>,
    pub ack: Option<u32>,
    pub finished: bool,
    pub encrypted: bool,

    // Bytes of an application message still waiting for the rest of it.
    #[serde(skip)]
    pub temp: Vec<u8>,
}

impl TcpStack {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            ..Default::default()
        }
    }

    /// Exact retransmission of the last accepted segment.
    pub fn check_dump(&self, sequence: u32, next: u32) -> bool {
        self.sequence == Some(sequence) && self.next == Some(next)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpConnection {
    pub key: String,
    pub stacks: [TcpStack; 2],

    // Segments seen / segments that advanced a stack.
    pub count: usize,
    pub count_use: usize,

    // Captured frame bytes, payload bytes, payload bytes that advanced a stack.
    pub total: usize,
    pub tcp_size: usize,
    pub tcp_use: usize,

    pub is_tls: bool,
    pub first_frame: usize,
    pub last_frame: usize,
}

impl TcpConnection {
    pub fn new(key: String, lower: String, higher: String, frame: usize) -> Self {
        Self {
            key,
            stacks: [TcpStack::new(lower), TcpStack::new(higher)],
            first_frame: frame,
            last_frame: frame,
            ..Default::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stacks.iter().all(|stack| stack.finished)
    }

    pub fn update(
        &mut self, frame: usize, frame_length: usize, direction: usize, segment: &Segment,
    ) -> TcpTrack {
        let next = segment.next_sequence();

        self.count += 1;
        self.total += frame_length;
        self.tcp_size += segment.payload_length;
        self.last_frame = frame;

        let stack = &mut self.stacks[direction];
        let is_dump = stack.check_dump(segment.sequence, next);
        let miss_pre = !is_dump
            && stack
                .next
                .is_some_and(|expected| expected != segment.sequence);
        if miss_pre {
            stack.temp.clear();
        }

        // Late segments never move the stack back. A forward gap resyncs it.
        let late = miss_pre
            && stack
                .next
                .is_some_and(|expected| is_before(segment.sequence, expected));

        if !is_dump && !late {
            stack.sequence = Some(segment.sequence);
            stack.next = Some(next);
            if segment.fin {
                stack.finished = true;
            }

            if segment.ack {
                self.stacks[peer(direction)].ack = Some(segment.acknowledgement);
            }
            self.count_use += 1;
            self.tcp_use += segment.payload_length;
        }

        TcpTrack {
            key: self.key.clone(),
            direction,
            is_dump,
            miss_pre,
        }
    }
}

/// `sequence` comes before `reference` in modulo 2^32 order.
pub fn is_before(sequence: u32, reference: u32) -> bool {
    (sequence.wrapping_sub(reference) as i32) < 0
}

pub fn peer(direction: usize) -> usize {
    1 - direction.min(1)
}

/// Canonical key of the flow between two `ip:port` endpoints and the index of
/// `source` inside it. Both directions of a flow produce the same key.
pub fn connection_key(source: &str, destination: &str) -> (String, usize) {
    if source <= destination {
        (format!("{}-{}", source, destination), 0)
    } else {
        (format!("{}-{}", destination, source), 1)
    }
}
