use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ip::protocol::IpNextLevelProtocol;
use crate::protocols::{HasIpAddresses, ProtocolData, ProtocolId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

// IPv4 Protocol
// RFC 791: https://datatracker.ietf.org/doc/html/rfc791

pub const MINIMUM_HEADER_LENGTH: usize = 20;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut ipv4 = IPv4::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut ipv4);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::IPv4(ipv4), fields, result)
}

fn read(fields: &mut FieldReader, ipv4: &mut IPv4) -> Result<(), DissectError> {
    let start = fields.position();

    // Version (4 bits), IHL (4 bits), stored in 32-bit words.
    let first = fields.u8_as("Version / Header Length", |byte| {
        format!("version {}, {} bytes", byte >> 4, (byte & 0x0F) * 4)
    })?;
    ipv4.version = first >> 4;
    ipv4.internet_header_length = (first & 0x0F) * 4;
    if ipv4.version != 4 {
        return Err(DissectError::Verify("IPv4 version is not 4"));
    }
    if (ipv4.internet_header_length as usize) < MINIMUM_HEADER_LENGTH {
        return Err(DissectError::Verify("IPv4 header length is too small"));
    }

    // DSCP (6 bits), ECN (2 bits)
    let tos = fields.u8("Differentiated Services")?;
    ipv4.differentiated_services_code_point = tos >> 2;
    ipv4.explicit_congestion_notification = tos & 0b11;

    ipv4.total_length = fields.u16("Total Length")?;
    ipv4.identification = fields.u16_as("Identification", |id| format!("0x{:04x}", id))?;

    // Flags (3 bits), Fragment Offset (13 bits), in 8-byte units.
    let fragment = fields.u16_as("Flags / Fragment Offset", |value| {
        format!("flags 0x{:x}, offset {}", value >> 13, (value & 0x1FFF) * 8)
    })?;
    ipv4.flags = (fragment >> 13) as u8;
    ipv4.fragment_offset = fragment & 0x1FFF;

    ipv4.time_to_live = fields.u8("Time to Live")?;
    let protocol = fields.u8_as("Protocol", |code| IpNextLevelProtocol::render(*code))?;
    ipv4.protocol_inner = IpNextLevelProtocol::from(protocol);
    ipv4.checksum = fields.u16_as("Header Checksum", |sum| format!("0x{:04x}", sum))?;
    ipv4.address_source = fields.ipv4("Source Address")?;
    ipv4.address_destination = fields.ipv4("Destination Address")?;

    let options = (ipv4.internet_header_length as usize)
        .saturating_sub(fields.position().saturating_sub(start));
    if options > 0 {
        fields.skip("Options", options)?;
    }

    // Cutting link-layer padding.
    let payload_length = (ipv4.total_length as usize)
        .checked_sub(ipv4.internet_header_length as usize)
        .ok_or(DissectError::Verify("IPv4 total length is smaller than header"))?;
    fields.reader_mut().narrow(payload_length);

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    let ipv4 = match dissection.data(node) {
        Some(ProtocolData::IPv4(value)) => value,
        _ => return None,
    };

    if ipv4.is_fragment_tail() {
        debug!(
            "Frame #{}: IPv4 fragment at offset {} is not reassembled.",
            dissection.index,
            ipv4.fragment_offset * 8
        );
        return None;
    }

    ipv4.protocol_inner.next()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IPv4 {
    pub version: u8,
    pub internet_header_length: u8,
    pub differentiated_services_code_point: u8,
    pub explicit_congestion_notification: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub time_to_live: u8,
    pub protocol_inner: IpNextLevelProtocol,
    pub checksum: u16,
    pub address_source: Ipv4Addr,
    pub address_destination: Ipv4Addr,
}

impl IPv4 {
    pub const FLAG_DONT_FRAGMENT: u8 = 0b010;
    pub const FLAG_MORE_FRAGMENTS: u8 = 0b001;

    pub fn is_fragment_tail(&self) -> bool {
        self.fragment_offset != 0
    }
}

impl Default for IPv4 {
    fn default() -> Self {
        Self {
            version: 0,
            internet_header_length: 0,
            differentiated_services_code_point: 0,
            explicit_congestion_notification: 0,
            total_length: 0,
            identification: 0,
            flags: 0,
            fragment_offset: 0,
            time_to_live: 0,
            protocol_inner: IpNextLevelProtocol::default(),
            checksum: 0,
            address_source: Ipv4Addr::UNSPECIFIED,
            address_destination: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl HasIpAddresses for IPv4 {
    fn source_ip(&self) -> IpAddr {
        IpAddr::V4(self.address_source)
    }

    fn destination_ip(&self) -> IpAddr {
        IpAddr::V4(self.address_destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProcessResult;
    use crate::protocols::link_type;
    use crate::test_utils;

    #[test]
    fn test_ipv4_udp() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "01 00 5E 00 00 FC 40 61 86 9A F1 F5 08 00 45 00 00 32 6A 3D 00 00 01 11 AA 56 C0 A8 03 83 E0 00 00 FC D5 48 14 EB 00 1E 20 88 76 F2 00 00 00 01 00 00 00 00 00 00 04 77 70 61 64 00 00 01 00 01",
        );

        let actual = match frame.layers().nth(2) {
            Some(ProtocolData::IPv4(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = IPv4 {
            version: 4,
            internet_header_length: 20,
            differentiated_services_code_point: 0,
            explicit_congestion_notification: 0,
            total_length: 50,
            identification: 0x6a3d,
            flags: 0,
            fragment_offset: 0,
            time_to_live: 1,
            protocol_inner: IpNextLevelProtocol::UDP,
            checksum: 0xaa56,
            address_source: Ipv4Addr::new(192, 168, 3, 131),
            address_destination: Ipv4Addr::new(224, 0, 0, 252),
        };
        assert_eq!(actual, expected);
        assert_eq!(
            actual.destination_ip(),
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 252))
        );
        assert!(frame.find(ProtocolId::UDP).is_some());
    }

    #[test]
    fn test_ipv4_padding_is_cut() {
        // ICMP echo request padded by the link layer with 6 zero bytes.
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "00 1A 8C 10 AD 30 00 1E 68 51 4F A9 08 00 45 00 00 20 7E 74 00 00 20 01 EB DF AC 10 FF 01 43 D7 41 84 08 00 40 08 00 01 0F 55 41 42 43 44 00 00 00 00 00 00",
        );

        let icmp = match frame.layers().nth(3) {
            Some(ProtocolData::ICMPv4(value)) => value.clone(),
            _ => panic!(),
        };
        assert_eq!(icmp.data, vec![0x41, 0x42, 0x43, 0x44]);
        assert_eq!(frame.status, ProcessResult::Complete);
    }

    #[test]
    fn test_ipv4_fragment_is_not_dispatched() {
        // Same datagram as the UDP test, fragment offset 16 (128 bytes).
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "01 00 5E 00 00 FC 40 61 86 9A F1 F5 08 00 45 00 00 32 6A 3D 00 10 01 11 AA 56 C0 A8 03 83 E0 00 00 FC D5 48 14 EB 00 1E 20 88 76 F2 00 00 00 01 00 00 00 00 00 00 04 77 70 61 64 00 00 01 00 01",
        );

        match frame.layers().nth(2) {
            Some(ProtocolData::IPv4(value)) => {
                assert_eq!(value.fragment_offset, 16);
                assert!(value.is_fragment_tail());
            },
            _ => panic!(),
        }
        assert!(frame.find(ProtocolId::UDP).is_none());
        assert_eq!(frame.status, ProcessResult::Incomplete);
    }

    #[test]
    fn test_ipv4_wrong_version_is_malformed() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "01 00 5E 00 00 FC 40 61 86 9A F1 F5 08 00 55 00 00 32 6A 3D 00 00 01 11 AA 56 C0 A8 03 83 E0 00 00 FC",
        );

        let node = match frame.find(ProtocolId::IPv4) {
            Some(value) => value,
            None => panic!(),
        };
        assert_eq!(
            node.malformed.as_deref(),
            Some("Verification failed: IPv4 version is not 4")
        );
        assert_eq!(frame.status, ProcessResult::Failed);
    }
}
