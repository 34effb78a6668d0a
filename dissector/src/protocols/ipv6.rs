use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ip::protocol::IpNextLevelProtocol;
use crate::protocols::{HasIpAddresses, ProtocolData, ProtocolId};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr};

// IPv6 Protocol
// RFC 8200: https://datatracker.ietf.org/doc/html/rfc8200

pub const HEADER_LENGTH: usize = 40;
pub const FRAGMENT_HEADER_LENGTH: usize = 8;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut ipv6 = IPv6::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut ipv6);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::IPv6(ipv6), fields, result)
}

fn read(fields: &mut FieldReader, ipv6: &mut IPv6) -> Result<(), DissectError> {
    // Version (4 bits), Traffic Class (8 bits), Flow Label (20 bits)
    let first = fields.u32_as("Version / Class / Flow Label", |word| {
        format!(
            "version {}, class 0x{:02x}, flow 0x{:05x}",
            word >> 28,
            (word >> 20) & 0xFF,
            word & 0x000F_FFFF
        )
    })?;
    ipv6.version = (first >> 28) as u8;
    ipv6.traffic_class = ((first >> 20) & 0xFF) as u8;
    ipv6.flow_label = first & 0x000F_FFFF;
    if ipv6.version != 6 {
        return Err(DissectError::Verify("IPv6 version is not 6"));
    }

    ipv6.payload_length = fields.u16("Payload Length")?;
    let next_header = fields.u8_as("Next Header", |code| IpNextLevelProtocol::render(*code))?;
    ipv6.next_header = IpNextLevelProtocol::from(next_header);
    ipv6.hop_limit = fields.u8("Hop Limit")?;
    ipv6.address_source = fields.ipv6("Source Address")?;
    ipv6.address_destination = fields.ipv6("Destination Address")?;

    // Cutting link-layer padding.
    fields.reader_mut().narrow(ipv6.payload_length as usize);

    while ipv6.next_header.is_extension() {
        let header = ipv6.next_header;
        let result = fields.group(format!("Extension Header: {}", header), |fields| {
            let next = fields.u8_as("Next Header", |code| IpNextLevelProtocol::render(*code))?;
            let length = match header {
                IpNextLevelProtocol::Ipv6Frag => {
                    fields.u8("Reserved")?;
                    let offset = fields.u16_as("Fragment Offset", |value| {
                        format!("{}", (value >> 3) * 8)
                    })?;
                    ipv6.fragment_offset = Some(offset >> 3);
                    fields.u32("Identification")?;
                    return Ok(next);
                },
                // Hdr Ext Len is in 8-octet units, not counting the first 8 octets.
                _ => (fields.u8("Length")? as usize + 1) * 8,
            };
            fields.skip("Data", length.saturating_sub(2))?;
            Ok::<u8, DissectError>(next)
        });
        ipv6.next_header = IpNextLevelProtocol::from(result?);
        ipv6.extension_headers.push(header);
    }

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    match dissection.data(node) {
        Some(ProtocolData::IPv6(value)) if value.fragment_offset.unwrap_or(0) == 0 => {
            value.next_header.next()
        },
        _ => None,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IPv6 {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: IpNextLevelProtocol,
    pub hop_limit: u8,
    pub address_source: Ipv6Addr,
    pub address_destination: Ipv6Addr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_headers: Vec<IpNextLevelProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_offset: Option<u16>,
}

impl Default for IPv6 {
    fn default() -> Self {
        Self {
            version: 0,
            traffic_class: 0,
            flow_label: 0,
            payload_length: 0,
            next_header: IpNextLevelProtocol::default(),
            hop_limit: 0,
            address_source: Ipv6Addr::UNSPECIFIED,
            address_destination: Ipv6Addr::UNSPECIFIED,
            extension_headers: vec![],
            fragment_offset: None,
        }
    }
}

impl HasIpAddresses for IPv6 {
    fn source_ip(&self) -> IpAddr {
        IpAddr::V6(self.address_source)
    }

    fn destination_ip(&self) -> IpAddr {
        IpAddr::V6(self.address_destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::link_type;
    use crate::test_utils;
    use std::str::FromStr;

    #[test]
    fn test_ipv6_tcp() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "22 1A 95 D6 7A 23 86 93 23 D3 37 8E 86 DD 60 0D 68 4A 00 7D 06 40 FC 00 00 02 00 00 00 02 00 00 00 00 00 00 00 01 FC 00 00 02 00 00 00 01 00 00 00 00 00 00 00 01 A9 A0 1F 90 02 1B 63 8D BA 31 1E 8E 80 18 00 CF C9 2E 00 00 01 01 08 0A 80 1D A5 22 80 1D A5 22 47 45 54 20 2F 68 65 6C 6C 6F 2E 74 78 74 20 48 54 54 50 2F 31 2E 31 0D 0A 55 73 65 72 2D 41 67 65 6E 74 3A 20 63 75 72 6C 2F 37 2E 33 38 2E 30 0D 0A 48 6F 73 74 3A 20 5B 66 63 30 30 3A 32 3A 30 3A 31 3A 3A 31 5D 3A 38 30 38 30 0D 0A 41 63 63 65 70 74 3A 20 2A 2F 2A 0D 0A 0D 0A",
        );

        let actual = match frame.layers().nth(2) {
            Some(ProtocolData::IPv6(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = IPv6 {
            version: 6,
            traffic_class: 0,
            flow_label: 0xD684A,
            payload_length: 125,
            next_header: IpNextLevelProtocol::TCP,
            hop_limit: 64,
            address_source: Ipv6Addr::from_str("fc00:2:0:2::1").unwrap(),
            address_destination: Ipv6Addr::from_str("fc00:2:0:1::1").unwrap(),
            extension_headers: vec![],
            fragment_offset: None,
        };
        assert_eq!(actual, expected);
        assert!(frame.find(ProtocolId::TCP).is_some());
    }

    #[test]
    fn test_ipv6_hop_by_hop_is_skipped() {
        // MLDv2 report behind a Hop-by-Hop router alert option.
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "33 33 00 00 00 16 00 1A 8C 15 F9 80 86 DD 60 00 00 00 00 10 00 01 FE 80 00 00 00 00 00 00 02 1A 8C FF FE 15 F9 80 FF 02 00 00 00 00 00 00 00 00 00 00 00 00 00 16 3A 00 05 02 00 00 01 00 8F 00 00 00 00 00 00 00",
        );

        let ipv6 = match frame.layers().nth(2) {
            Some(ProtocolData::IPv6(value)) => value.clone(),
            _ => panic!(),
        };
        assert_eq!(ipv6.extension_headers, vec![IpNextLevelProtocol::HopByHop]);
        assert_eq!(ipv6.next_header, IpNextLevelProtocol::Ipv6Icmp);
        assert!(frame.find(ProtocolId::ICMPv6).is_some());
    }
}
