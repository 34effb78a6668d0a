use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ProtocolData;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

// ICMPv6 Protocol
// RFC 4443: https://datatracker.ietf.org/doc/html/rfc4443
// Neighbor Discovery, RFC 4861: https://datatracker.ietf.org/doc/html/rfc4861

pub const TYPE_ECHO_REQUEST: u8 = 128;
pub const TYPE_ECHO_REPLY: u8 = 129;
pub const TYPE_NEIGHBOR_SOLICITATION: u8 = 135;
pub const TYPE_NEIGHBOR_ADVERTISEMENT: u8 = 136;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut icmp = ICMPv6::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut icmp);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::ICMPv6(icmp), fields, result)
}

fn read(fields: &mut FieldReader, icmp: &mut ICMPv6) -> Result<(), DissectError> {
    icmp.message_type = fields.u8_as("Type", |code| format!("{} ({})", type_name(*code), code))?;
    icmp.code = fields.u8("Code")?;
    icmp.checksum = fields.u16_as("Checksum", |sum| format!("0x{:04x}", sum))?;

    match icmp.message_type {
        TYPE_ECHO_REQUEST | TYPE_ECHO_REPLY => {
            icmp.identifier = Some(fields.u16("Identifier")?);
            icmp.sequence = Some(fields.u16("Sequence Number")?);
        },
        TYPE_NEIGHBOR_SOLICITATION | TYPE_NEIGHBOR_ADVERTISEMENT => {
            fields.u32_as("Flags", |flags| format!("0x{:08x}", flags))?;
            icmp.target = Some(fields.ipv6("Target Address")?);
        },
        _ => {},
    }

    let left = fields.left();
    icmp.data = fields.take("Data", left)?.to_vec();

    Ok(())
}

pub fn type_name(message_type: u8) -> &'static str {
    match message_type {
        1 => "Destination Unreachable",
        2 => "Packet Too Big",
        3 => "Time Exceeded",
        4 => "Parameter Problem",
        TYPE_ECHO_REQUEST => "Echo Request",
        TYPE_ECHO_REPLY => "Echo Reply",
        133 => "Router Solicitation",
        134 => "Router Advertisement",
        TYPE_NEIGHBOR_SOLICITATION => "Neighbor Solicitation",
        TYPE_NEIGHBOR_ADVERTISEMENT => "Neighbor Advertisement",
        143 => "Multicast Listener Report v2",
        _ => "Unknown",
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ICMPv6 {
    pub message_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: Option<u16>,
    pub sequence: Option<u16>,
    pub target: Option<Ipv6Addr>,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::link_type;
    use crate::test_utils;
    use std::str::FromStr;

    #[test]
    fn test_icmpv6_advertisement() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "00 60 97 07 69 EA 00 00 86 05 80 DA 86 DD 60 00 00 00 00 18 3A FF FE 80 00 00 00 00 00 00 02 00 86 FF FE 05 80 DA FE 80 00 00 00 00 00 00 02 60 97 FF FE 07 69 EA 88 00 2A 18 40 00 00 00 FE 80 00 00 00 00 00 00 02 00 86 FF FE 05 80 DA",
        );

        let actual = match frame.layers().nth(3) {
            Some(ProtocolData::ICMPv6(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = ICMPv6 {
            message_type: TYPE_NEIGHBOR_ADVERTISEMENT,
            code: 0,
            checksum: 0x2a18,
            identifier: None,
            sequence: None,
            target: Some(Ipv6Addr::from_str("fe80::200:86ff:fe05:80da").unwrap()),
            data: vec![],
        };
        assert_eq!(actual, expected);
    }
}
