use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::{HasPorts, ProtocolData, ProtocolId, dns};
use serde::{Deserialize, Serialize};

// UDP Protocol
// RFC 768: https://datatracker.ietf.org/doc/html/rfc768

pub const HEADER_LENGTH: usize = 8;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut udp = UDP::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut udp);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::UDP(udp), fields, result)
}

fn read(fields: &mut FieldReader, udp: &mut UDP) -> Result<(), DissectError> {
    udp.port_source = fields.u16("Source Port")?;
    udp.port_destination = fields.u16("Destination Port")?;
    udp.length = fields.u16("Length")?;
    udp.checksum = fields.u16_as("Checksum", |sum| format!("0x{:04x}", sum))?;

    if let Some(payload) = (udp.length as usize).checked_sub(HEADER_LENGTH) {
        fields.reader_mut().narrow(payload);
    }

    Ok(())
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    // Checking ports
    let layer = match dissection.data(node) {
        Some(ProtocolData::UDP(value)) => value,
        _ => return None,
    };

    if dissection.options.decode_dns
        && !dissection.reader.is_empty()
        && dns::is_dns_port(layer.port_source, layer.port_destination)
    {
        Some(ProtocolId::DNS)
    } else {
        None
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UDP {
    pub port_source: u16,
    pub port_destination: u16,
    pub length: u16,
    pub checksum: u16,
}

impl HasPorts for UDP {
    fn source_port(&self) -> u16 {
        self.port_source
    }

    fn destination_port(&self) -> u16 {
        self.port_destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProcessResult;
    use crate::protocols::link_type;
    use crate::test_utils;

    #[test]
    fn test_udp_without_ethernet_padding() {
        let frame = test_utils::dissect(
            link_type::ETHERNET,
            "01 00 5E 00 00 FC 40 61 86 9A F1 F5 08 00 45 00 00 32 6A 3D 00 00 01 11 AA 56 C0 A8 03 83 E0 00 00 FC D5 48 14 EB 00 1E 20 88 76 F2 00 00 00 01 00 00 00 00 00 00 04 77 70 61 64 00 00 01 00 01",
        );

        let actual = match frame.layers().nth(3) {
            Some(ProtocolData::UDP(value)) => value.clone(),
            _ => panic!(),
        };
        let expected = UDP {
            port_source: 54600,
            port_destination: 5355,
            length: 30,
            checksum: 0x2088,
        };
        assert_eq!(actual, expected);
        assert_eq!(frame.tree.len(), 4);
        assert_eq!(frame.status, ProcessResult::Incomplete);

        let provider = match frame.tree.port_provider(NodeId(3)) {
            Some(value) => value,
            None => panic!(),
        };
        assert_eq!(provider.destination_port(), 5355);
    }
}
