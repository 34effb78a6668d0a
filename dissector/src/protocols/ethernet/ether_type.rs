use crate::protocols::ProtocolId;
use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, FromPrimitive, PartialEq, Serialize, Deserialize)]
#[repr(u16)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    ArpReverse = 0x8035,
    Vlan = 0x8100,
    Ipv6 = 0x86DD,
    Lldp = 0x88CC,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for EtherType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl EtherType {
    pub fn code(&self) -> u16 {
        match self {
            Self::Ipv4 => 0x0800,
            Self::Arp => 0x0806,
            Self::ArpReverse => 0x8035,
            Self::Vlan => 0x8100,
            Self::Ipv6 => 0x86DD,
            Self::Lldp => 0x88CC,
            Self::Unknown(value) => *value,
        }
    }

    /// Visitor for the payload, `None` ends the chain.
    pub fn next(&self) -> Option<ProtocolId> {
        match self {
            Self::Ipv4 => Some(ProtocolId::IPv4),
            Self::Ipv6 => Some(ProtocolId::IPv6),
            Self::Arp => Some(ProtocolId::Arp),
            Self::Vlan => Some(ProtocolId::Vlan),
            Self::ArpReverse | Self::Lldp | Self::Unknown(_) => None,
        }
    }

    pub fn render(code: u16) -> String {
        match Self::from_primitive(code) {
            Self::Unknown(_) => format!("Unknown (0x{:04x})", code),
            known => format!("{} (0x{:04x})", known, code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(EtherType::from(0x86DD), EtherType::Ipv6);
        assert_eq!(EtherType::from(0x1234), EtherType::Unknown(0x1234));
        assert_eq!(EtherType::Unknown(0x1234).code(), 0x1234);
        assert_eq!(EtherType::render(0x0800), "Ipv4 (0x0800)");
        assert_eq!(EtherType::Lldp.next(), None);
    }
}
