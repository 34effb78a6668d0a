use dissector::capture::CaptureMetadata;
use dissector::context::Context;
use dissector::frame::{Frame, ProcessResult};
use dissector::resolver::arp::ArpReply;
use dissector::resolver::dns::DnsRecord;
use dissector::resolver::tcp::TcpConnection;
use serde::Serialize;

/// Tables printed for one capture.
#[derive(Serialize)]
pub struct Report<'c> {
    pub metadata: &'c CaptureMetadata,
    pub frames: Vec<FrameSummary<'c>>,
    pub arp_replies: Vec<&'c ArpReply>,
    pub tcp_connections: &'c [TcpConnection],
    pub dns_records: &'c [DnsRecord],
}

#[derive(Serialize)]
pub struct FrameSummary<'c> {
    pub index: usize,
    pub timestamp_ms: u64,
    pub captured_length: u32,
    pub status: ProcessResult,
    pub protocols: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed: Option<&'c str>,
}

impl<'c> FrameSummary<'c> {
    fn new(frame: &'c Frame) -> Self {
        Self {
            index: frame.index,
            timestamp_ms: frame.header.timestamp_ms,
            captured_length: frame.header.captured_length,
            status: frame.status,
            protocols: frame.tree.iter().map(|node| node.id.to_string()).collect(),
            malformed: frame.tree.iter().find_map(|node| node.malformed.as_deref()),
        }
    }
}

impl<'c> Report<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self {
            metadata: context.metadata(),
            frames: context.frames().iter().map(FrameSummary::new).collect(),
            arp_replies: context.arp_replies().collect(),
            tcp_connections: context.tcp_connections(),
            dns_records: context.dns_records(),
        }
    }
}

pub fn to_json(report: &Report, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
}
