use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::ethernet::mac::MacAddress;
use crate::protocols::{ProtocolData, ProtocolId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Ethernet II
// IEEE 802.3: https://standards.ieee.org/ieee/802.3/10422/

pub const HEADER_LENGTH: usize = 14;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut ethernet = Ethernet::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut ethernet);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::Ethernet(ethernet), fields, result)
}

fn read(fields: &mut FieldReader, ethernet: &mut Ethernet) -> Result<(), DissectError> {
    ethernet.destination_mac = fields.mac("Destination")?;
    ethernet.source_mac = fields.mac("Source")?;
    let code = fields.u16_as("Type", |code| EtherType::render(*code))?;
    ethernet.ether_type = EtherType::from(code);

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    match dissection.data(node) {
        Some(ProtocolData::Ethernet(value)) => value.ether_type.next(),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Ethernet {
    pub destination_mac: MacAddress,
    pub source_mac: MacAddress,
    pub ether_type: EtherType,
}

#[derive(Debug, Error, PartialEq)]
pub enum EthernetError {
    #[error("Failed to decode MAC from hex")]
    MacFailedHexDecode,

    #[error("MAC string has invalid length")]
    MacInvalidStringLength,
}

pub mod ether_type;
pub mod mac;
pub mod vlan;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProcessResult;
    use crate::protocols::link_type;
    use crate::test_utils;

    #[test]
    fn test_ethernet_unknown_ether_type() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "01 80 C2 00 00 0E 00 1A 8C 15 F9 80 88 CC 02 07 04 00 1A 8C 15 F9 80",
        );

        let actual = match frame.layers().nth(1) {
            Some(ProtocolData::Ethernet(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = Ethernet {
            destination_mac: MacAddress::try_from("01:80:C2:00:00:0E").unwrap(),
            source_mac: MacAddress::try_from("00:1A:8C:15:F9:80").unwrap(),
            ether_type: EtherType::Lldp,
        };
        assert_eq!(actual, expected);
        assert_eq!(frame.tree.len(), 2);
        assert_eq!(frame.status, ProcessResult::Incomplete);

        let node = match frame.find(ProtocolId::Ethernet) {
            Some(value) => value,
            None => panic!(),
        };
        let field = match node.field("Type") {
            Some(value) => value,
            None => panic!(),
        };
        assert_eq!((field.start, field.length), (12, 2));
        assert_eq!(field.render, "Type: Lldp (0x88cc)");
        assert_eq!(frame.field_bytes(node, field), Some(&[0x88, 0xCC][..]));
    }
}
