use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ProtocolData;
use serde::{Deserialize, Serialize};

// ICMPv4 Protocol
// RFC 792: https://datatracker.ietf.org/doc/html/rfc792

pub const TYPE_ECHO_REPLY: u8 = 0;
pub const TYPE_DESTINATION_UNREACHABLE: u8 = 3;
pub const TYPE_REDIRECT: u8 = 5;
pub const TYPE_ECHO_REQUEST: u8 = 8;
pub const TYPE_TIME_EXCEEDED: u8 = 11;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut icmp = ICMPv4::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut icmp);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::ICMPv4(icmp), fields, result)
}

fn read(fields: &mut FieldReader, icmp: &mut ICMPv4) -> Result<(), DissectError> {
    icmp.message_type = fields.u8_as("Type", |code| format!("{} ({})", type_name(*code), code))?;
    icmp.code = fields.u8("Code")?;
    icmp.checksum = fields.u16_as("Checksum", |sum| format!("0x{:04x}", sum))?;

    if matches!(icmp.message_type, TYPE_ECHO_REPLY | TYPE_ECHO_REQUEST) {
        icmp.identifier = Some(fields.u16("Identifier")?);
        icmp.sequence = Some(fields.u16("Sequence Number")?);
    }

    // Data, depending on type & code.
    let left = fields.left();
    icmp.data = fields.take("Data", left)?.to_vec();

    Ok(())
}

pub fn type_name(message_type: u8) -> &'static str {
    match message_type {
        TYPE_ECHO_REPLY => "Echo Reply",
        TYPE_DESTINATION_UNREACHABLE => "Destination Unreachable",
        TYPE_REDIRECT => "Redirect",
        TYPE_ECHO_REQUEST => "Echo Request",
        TYPE_TIME_EXCEEDED => "Time Exceeded",
        _ => "Unknown",
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ICMPv4 {
    pub message_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: Option<u16>,
    pub sequence: Option<u16>,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}
