use crate::capture::CaptureMetadata;
use crate::frame::Frame;
use crate::resolver::Resolver;
use crate::resolver::arp::ArpReply;
use crate::resolver::dns::DnsRecord;
use crate::resolver::tcp::TcpConnection;

/// Everything one parse produced. Read-only once built.
#[derive(Debug, Default)]
pub struct Context {
    frames: Vec<Frame>,
    metadata: CaptureMetadata,
    resolver: Resolver,
}

impl Context {
    pub fn new(frames: Vec<Frame>, metadata: CaptureMetadata, resolver: Resolver) -> Self {
        Self {
            frames,
            metadata,
            resolver,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Frame by its 1-based index.
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index.checked_sub(1)?)
    }

    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    pub fn arp_replies(&self) -> impl Iterator<Item = &ArpReply> {
        self.resolver.arp_map.values()
    }

    pub fn tcp_connections(&self) -> &[TcpConnection] {
        &self.resolver.tcp_connections
    }

    pub fn connection(&self, key: &str) -> Option<&TcpConnection> {
        self.resolver.connection(key)
    }

    pub fn dns_records(&self) -> &[DnsRecord] {
        &self.resolver.dns_records
    }
}
