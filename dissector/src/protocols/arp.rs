use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::arp::hardware_type::HardwareType;
use crate::protocols::arp::operation::Operation;
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::ethernet::mac::{self, MacAddress};
use crate::protocols::ProtocolData;
use crate::resolver::arp::ArpHost;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

// ARP Protocol
// RFC 826: https://datatracker.ietf.org/doc/html/rfc826

pub const PACKET_LENGTH: usize = 28;
pub const IPV4_ADDRESS_LENGTH: u8 = 4;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    // Cutting Ethernet padding & FCS
    dissection.reader.narrow(PACKET_LENGTH);

    let mut arp = Arp::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut arp);
    let fields = fields.into_fields();

    if result.is_ok() && arp.operation == Operation::Reply {
        let sender = ArpHost {
            ip: arp.sender_ip,
            mac: arp.sender_mac,
        };
        let target = ArpHost {
            ip: arp.target_ip,
            mac: arp.target_mac,
        };
        dissection
            .resolver
            .register_arp_reply(dissection.index, sender, target);
    }

    dissection.link(parent, ProtocolData::Arp(arp), fields, result)
}

fn read(fields: &mut FieldReader, arp: &mut Arp) -> Result<(), DissectError> {
    // HTYPE
    let hardware_type = fields.u16_as("Hardware Type", |code| {
        format!("{} ({})", HardwareType::from(*code), code)
    })?;
    arp.hardware_type = HardwareType::from(hardware_type);

    // PTYPE
    let protocol_type = fields.u16_as("Protocol Type", |code| EtherType::render(*code))?;
    arp.protocol_type = EtherType::from(protocol_type);

    // HLEN, PLEN
    arp.hardware_address_length = fields.u8("Hardware Size")?;
    arp.protocol_address_length = fields.u8("Protocol Size")?;
    if arp.hardware_address_length != mac::LENGTH_BYTES as u8
        || arp.protocol_address_length != IPV4_ADDRESS_LENGTH
    {
        return Err(DissectError::Verify("ARP is not Ethernet/IPv4"));
    }

    // OP
    let operation = fields.u16_as("Opcode", |code| {
        format!("{} ({})", Operation::from(*code), code)
    })?;
    arp.operation = Operation::from(operation);

    arp.sender_mac = fields.mac("Sender MAC Address")?;
    arp.sender_ip = fields.ipv4("Sender IP Address")?;
    arp.target_mac = fields.mac("Target MAC Address")?;
    arp.target_ip = fields.ipv4("Target IP Address")?;

    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Arp {
    pub hardware_type: HardwareType,
    pub protocol_type: EtherType,

    pub hardware_address_length: u8,
    pub protocol_address_length: u8,

    pub operation: Operation,

    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,

    pub target_mac: MacAddress,
    pub target_ip: Ipv4Addr,
}

impl Default for Arp {
    fn default() -> Self {
        Self {
            hardware_type: HardwareType::default(),
            protocol_type: EtherType::default(),
            hardware_address_length: 0,
            protocol_address_length: 0,
            operation: Operation::default(),
            sender_mac: MacAddress::default(),
            sender_ip: Ipv4Addr::UNSPECIFIED,
            target_mac: MacAddress::default(),
            target_ip: Ipv4Addr::UNSPECIFIED,
        }
    }
}

pub mod hardware_type;
pub mod operation;
