use crate::frame::{FrameLayer, NodeId};
use crate::parser::{DissectFn, Dissection};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum_macros::Display;

/// Guide: How to Add a Protocol
/// 1. Add it to the `ProtocolId` enum and its layer record to `ProtocolData`.
/// 2. If the protocol is a root protocol, map the link type to it in `ProtocolId::root`.
/// 3. Write a visitor with the signature `DissectFn` in your module and link it in
///    `ProtocolId::dissect`. The visitor reads through a `FieldReader` and pushes
///    exactly one node, even when decoding fails half way.
/// 4. If the protocol carries a type code or ports, write `best_children` in your
///    module and link it in `ProtocolId::best_children`.
///
/// After that, write tests with a real frame in hex.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ProtocolId {
    Frame,

    Ethernet,
    LinuxSll,
    Vlan,

    Arp,

    IPv4,
    IPv6,

    ICMPv4,
    ICMPv6,
    TCP,
    UDP,

    DNS,
    HTTP,
    TLS,
}

pub mod link_type {
    pub const ETHERNET: u16 = 1;
    pub const RAW: u16 = 101;
    pub const LINUX_SLL: u16 = 113;
    pub const IPV4: u16 = 228;
    pub const IPV6: u16 = 229;
}

impl ProtocolId {
    pub fn root(link_type: u16, first_byte: Option<u8>) -> Option<Self> {
        match link_type {
            link_type::ETHERNET => Some(Self::Ethernet),
            link_type::LINUX_SLL => Some(Self::LinuxSll),
            link_type::IPV4 => Some(Self::IPv4),
            link_type::IPV6 => Some(Self::IPv6),
            // Raw IP: the version nibble decides.
            link_type::RAW => match first_byte.map(|byte| byte >> 4) {
                Some(4) => Some(Self::IPv4),
                Some(6) => Some(Self::IPv6),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn dissect(&self) -> Option<DissectFn> {
        match self {
            Self::Frame => None,
            Self::Ethernet => Some(ethernet::dissect),
            Self::LinuxSll => Some(linux_sll::dissect),
            Self::Vlan => Some(ethernet::vlan::dissect),
            Self::Arp => Some(arp::dissect),
            Self::IPv4 => Some(ipv4::dissect),
            Self::IPv6 => Some(ipv6::dissect),
            Self::ICMPv4 => Some(icmpv4::dissect),
            Self::ICMPv6 => Some(icmpv6::dissect),
            Self::TCP => Some(tcp::dissect),
            Self::UDP => Some(udp::dissect),
            Self::DNS => Some(dns::dissect),
            Self::HTTP => Some(http::dissect),
            Self::TLS => Some(tls::dissect),
        }
    }

    pub fn best_children(&self, dissection: &Dissection, node: NodeId) -> Option<Self> {
        match self {
            Self::Ethernet => ethernet::best_children(dissection, node),
            Self::LinuxSll => linux_sll::best_children(dissection, node),
            Self::Vlan => ethernet::vlan::best_children(dissection, node),
            Self::IPv4 => ipv4::best_children(dissection, node),
            Self::IPv6 => ipv6::best_children(dissection, node),
            Self::TCP => tcp::best_children(dissection, node),
            Self::UDP => udp::best_children(dissection, node),
            Self::Frame
            | Self::Arp
            | Self::ICMPv4
            | Self::ICMPv6
            | Self::DNS
            | Self::HTTP
            | Self::TLS => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ProtocolData {
    Frame(FrameLayer),

    Ethernet(ethernet::Ethernet),
    LinuxSll(linux_sll::LinuxSll),
    Vlan(ethernet::vlan::Vlan),

    Arp(arp::Arp),

    IPv4(ipv4::IPv4),
    IPv6(ipv6::IPv6),

    ICMPv4(icmpv4::ICMPv4),
    ICMPv6(icmpv6::ICMPv6),
    TCP(tcp::TCP),
    UDP(udp::UDP),

    DNS(dns::DNS),
    HTTP(http::HTTP),
    TLS(tls::TLS),
}

impl ProtocolData {
    pub fn id(&self) -> ProtocolId {
        match self {
            Self::Frame(_) => ProtocolId::Frame,
            Self::Ethernet(_) => ProtocolId::Ethernet,
            Self::LinuxSll(_) => ProtocolId::LinuxSll,
            Self::Vlan(_) => ProtocolId::Vlan,
            Self::Arp(_) => ProtocolId::Arp,
            Self::IPv4(_) => ProtocolId::IPv4,
            Self::IPv6(_) => ProtocolId::IPv6,
            Self::ICMPv4(_) => ProtocolId::ICMPv4,
            Self::ICMPv6(_) => ProtocolId::ICMPv6,
            Self::TCP(_) => ProtocolId::TCP,
            Self::UDP(_) => ProtocolId::UDP,
            Self::DNS(_) => ProtocolId::DNS,
            Self::HTTP(_) => ProtocolId::HTTP,
            Self::TLS(_) => ProtocolId::TLS,
        }
    }

    pub fn ip_provider(&self) -> Option<&dyn HasIpAddresses> {
        match self {
            Self::IPv4(value) => Some(value),
            Self::IPv6(value) => Some(value),
            _ => None,
        }
    }

    pub fn port_provider(&self) -> Option<&dyn HasPorts> {
        match self {
            Self::TCP(value) => Some(value),
            Self::UDP(value) => Some(value),
            _ => None,
        }
    }
}

pub trait HasIpAddresses {
    fn source_ip(&self) -> IpAddr;
    fn destination_ip(&self) -> IpAddr;
}

pub trait HasPorts {
    fn source_port(&self) -> u16;
    fn destination_port(&self) -> u16;
}

pub mod arp;
pub mod dns;
pub mod ethernet;
pub mod http;
pub mod icmpv4;
pub mod icmpv6;
pub mod ip {
    pub mod protocol;
}
pub mod ipv4;
pub mod ipv6;
pub mod linux_sll;
pub mod tcp;
pub mod tls;
pub mod udp;
