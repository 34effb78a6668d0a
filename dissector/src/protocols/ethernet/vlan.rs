use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::{ProtocolData, ProtocolId};
use serde::{Deserialize, Serialize};

// IEEE 802.1Q tag

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut vlan = Vlan::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut vlan);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::Vlan(vlan), fields, result)
}

fn read(fields: &mut FieldReader, vlan: &mut Vlan) -> Result<(), DissectError> {
    let tci = fields.u16_as("Tag Control", |tci| {
        format!("PCP {}, DEI {}, ID {}", tci >> 13, (tci >> 12) & 1, tci & 0x0FFF)
    })?;
    vlan.priority = (tci >> 13) as u8;
    vlan.drop_eligible = (tci >> 12) & 1 == 1;
    vlan.identifier = tci & 0x0FFF;

    let code = fields.u16_as("Type", |code| EtherType::render(*code))?;
    vlan.ether_type = EtherType::from(code);

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    match dissection.data(node) {
        Some(ProtocolData::Vlan(value)) => value.ether_type.next(),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Vlan {
    pub priority: u8,
    pub drop_eligible: bool,
    pub identifier: u16,
    pub ether_type: EtherType,
}
