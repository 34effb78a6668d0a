use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::{ProtocolData, ProtocolId};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

// Linux "cooked" capture, version 1
// https://www.tcpdump.org/linktypes/LINKTYPE_LINUX_SLL.html

pub const ADDRESS_FIELD_LENGTH: usize = 8;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut sll = LinuxSll::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut sll);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::LinuxSll(sll), fields, result)
}

fn read(fields: &mut FieldReader, sll: &mut LinuxSll) -> Result<(), DissectError> {
    let packet_type = fields.u16_as("Packet Type", |code| {
        match PacketType::try_from(*code) {
            Ok(value) => value.to_string(),
            Err(_) => format!("Unknown ({})", code),
        }
    })?;
    sll.packet_type = PacketType::try_from(packet_type).ok();

    sll.hardware_type = fields.u16("Link-layer Address Type")?;
    sll.address_length = fields.u16("Link-layer Address Length")?;

    let start = fields.position();
    let address = fields.reader_mut().take(ADDRESS_FIELD_LENGTH)?;
    let used = (sll.address_length as usize).min(ADDRESS_FIELD_LENGTH);
    sll.address = hex::encode(&address[..used]);
    fields.record("Source", start, &sll.address);

    let code = fields.u16_as("Protocol", |code| EtherType::render(*code))?;
    sll.protocol = EtherType::from(code);

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    match dissection.data(node) {
        Some(ProtocolData::LinuxSll(value)) => value.protocol.next(),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LinuxSll {
    pub packet_type: Option<PacketType>,
    pub hardware_type: u16,
    pub address_length: u16,
    pub address: String,
    pub protocol: EtherType,
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, TryFromPrimitive)]
#[repr(u16)]
pub enum PacketType {
    Unicast = 0,
    Broadcast = 1,
    Multicast = 2,
    OtherHost = 3,
    Outgoing = 4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::ipv4::IPv4;
    use crate::protocols::link_type;
    use crate::test_utils;

    #[test]
    fn test_linux_sll_ipv4() {
        let frame = test_utils::dissect(
            link_type::LINUX_SLL,
            "00 04 00 01 00 06 00 1A 8C 15 F9 80 00 00 08 00 45 00 00 1C 00 01 00 00 40 01 F6 7A C0 A8 00 67 C0 A8 00 01 08 00 F7 FF 00 00 00 00",
        );

        let actual = match frame.layers().nth(1) {
            Some(ProtocolData::LinuxSll(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = LinuxSll {
            packet_type: Some(PacketType::Outgoing),
            hardware_type: 1,
            address_length: 6,
            address: "001a8c15f980".to_string(),
            protocol: EtherType::Ipv4,
        };
        assert_eq!(actual, expected);

        match frame.layers().nth(2) {
            Some(ProtocolData::IPv4(IPv4 { time_to_live, .. })) => {
                assert_eq!(*time_to_live, 64)
            },
            _ => panic!(),
        }
        let icmp = match frame.find(ProtocolId::ICMPv4) {
            Some(value) => value,
            None => panic!(),
        };
        assert_eq!(icmp.parent, Some(NodeId(2)));
    }
}
