use crate::protocols::ProtocolId;
use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

// Assigned Internet Protocol Numbers
// https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xhtml

#[derive(Clone, Copy, Debug, Display, Eq, FromPrimitive, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum IpNextLevelProtocol {
    HopByHop = 0,
    ICMP = 1,
    IGMP = 2,
    TCP = 6,
    UDP = 17,
    IPv6 = 41,
    Ipv6Route = 43,
    Ipv6Frag = 44,
    GRE = 47,
    ESP = 50,
    AH = 51,
    Ipv6Icmp = 58,
    Ipv6NoNxt = 59,
    Ipv6Opts = 60,
    SCTP = 132,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Default for IpNextLevelProtocol {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl IpNextLevelProtocol {
    pub fn next(&self) -> Option<ProtocolId> {
        match self {
            Self::ICMP => Some(ProtocolId::ICMPv4),
            Self::Ipv6Icmp => Some(ProtocolId::ICMPv6),
            Self::TCP => Some(ProtocolId::TCP),
            Self::UDP => Some(ProtocolId::UDP),
            _ => None,
        }
    }

    /// IPv6 extension headers which share the `(next header, length)` prefix.
    pub fn is_extension(&self) -> bool {
        matches!(
            self,
            Self::HopByHop | Self::Ipv6Route | Self::Ipv6Frag | Self::Ipv6Opts
        )
    }

    pub fn render(code: u8) -> String {
        match Self::from_primitive(code) {
            Self::Unknown(_) => format!("Unknown ({})", code),
            known => format!("{} ({})", known, code),
        }
    }
}
