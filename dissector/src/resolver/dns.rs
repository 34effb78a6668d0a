use crate::protocols::dns::DnsType;
use serde::{Deserialize, Serialize};

/// One resolved answer, as announced by a DNS server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    // `ip:port` of the responding server.
    pub server: String,
    pub name: String,
    pub record_type: DnsType,
    pub value: String,
    pub time_to_live: u32,
    pub frame: usize,
}
