use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::{HasPorts, ProtocolData, ProtocolId, dns, http, tls};
use crate::resolver::tcp::{Segment, TcpTrack};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

// TCP Protocol
// RFC 9293: https://datatracker.ietf.org/doc/html/rfc9293

pub const MINIMUM_HEADER_LENGTH: usize = 20;

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let mut tcp = TCP::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut tcp);
    let fields = fields.into_fields();

    if result.is_ok() {
        tcp.payload_length = dissection.reader.left();
        if dissection.options.track_connections {
            tcp.track = track(dissection, parent, &tcp);
        }
    }

    dissection.link(parent, ProtocolData::TCP(tcp), fields, result)
}

fn read(fields: &mut FieldReader, tcp: &mut TCP) -> Result<(), DissectError> {
    let start = fields.position();

    tcp.port_source = fields.u16("Source Port")?;
    tcp.port_destination = fields.u16("Destination Port")?;
    tcp.sequence_number = fields.u32("Sequence Number")?;
    tcp.acknowledgement_number = fields.u32("Acknowledgment Number")?;

    // Data Offset, Reserved. Both - 4 bits. Data Offset is stored in 32bit words.
    let offset = fields.u8_as("Header Length", |byte| format!("{} bytes", (byte >> 4) * 4))?;
    tcp.data_offset = (offset >> 4) as u16 * 4;
    tcp.reserved = offset & 0x0F;
    if (tcp.data_offset as usize) < MINIMUM_HEADER_LENGTH {
        return Err(DissectError::Verify("TCP header length is too small"));
    }

    // Flags: 8 flags by 1 bit.
    let flags = fields.u8_as("Flags", |byte| Flags::from(*byte).to_string())?;
    tcp.flags = Flags::from(flags);

    tcp.window = fields.u16("Window")?;
    tcp.checksum = fields.u16_as("Checksum", |sum| format!("0x{:04x}", sum))?;
    tcp.urgent_pointer = fields.u16("Urgent Pointer")?;

    // Options - up to 320 bits.
    let options_length =
        (tcp.data_offset as usize).saturating_sub(fields.position().saturating_sub(start));
    if options_length > 0 {
        tcp.options = fields.group("Options", |fields| read_options(fields, options_length))?;
    }

    Ok(())
}

fn read_options(
    fields: &mut FieldReader, length: usize,
) -> Result<Vec<OptionData>, DissectError> {
    let end = fields.position() + length;
    let mut options = vec![];

    while fields.position() < end {
        let kind = fields.u8_as("Kind", |kind| match OptionId::try_from(*kind) {
            Ok(id) => format!("{:?} ({})", id, kind),
            Err(_) => format!("Unknown ({})", kind),
        })?;

        match OptionId::try_from(kind) {
            Ok(OptionId::EndOfOptionList) => {
                options.push(OptionData::EndOfOptionList);
                let padding = end.saturating_sub(fields.position());
                if padding > 0 {
                    fields.skip("Padding", padding)?;
                }
                break;
            },
            Ok(OptionId::NoOperation) => {
                options.push(OptionData::NoOperation);
                continue;
            },
            _ => {},
        }

        let size = fields.u8("Length")? as usize;
        if size < 2 || fields.position() + size - 2 > end {
            return Err(DissectError::Verify("TCP option length is invalid"));
        }
        let value_length = size - 2;

        let option = match (OptionId::try_from(kind), value_length) {
            (Ok(OptionId::MaximumSegmentSize), 2) => {
                OptionData::MaximumSegmentSize(fields.u16("Maximum Segment Size")?)
            },
            (Ok(OptionId::WindowScaling), 1) => {
                OptionData::WindowScaling(fields.u8("Shift Count")?)
            },
            (Ok(OptionId::SAckPermitted), 0) => OptionData::SAckPermitted,
            (Ok(OptionId::SAck), length) if length % 8 == 0 => {
                let mut blocks = Vec::with_capacity(length / 8);
                for _ in 0..(length / 8) {
                    let left = fields.u32("Left Edge")?;
                    let right = fields.u32("Right Edge")?;
                    blocks.push((left, right));
                }
                OptionData::SAck(blocks)
            },
            (Ok(OptionId::Timestamps), 8) => {
                let value = fields.u32("Timestamp Value")?;
                let echo = fields.u32("Timestamp Echo Reply")?;
                OptionData::Timestamps(value, echo)
            },
            (Ok(OptionId::FastOpen), length) => {
                OptionData::FastOpen(fields.hex("Cookie", length)?)
            },
            (_, length) => OptionData::Unknown {
                kind,
                data: fields.hex("Data", length)?,
            },
        };
        options.push(option);
    }

    Ok(options)
}

fn track(dissection: &mut Dissection, parent: NodeId, tcp: &TCP) -> Option<TcpTrack> {
    let (source, destination) = {
        let ip = dissection.tree.ip_provider(parent)?;
        (ip.source_ip(), ip.destination_ip())
    };

    let segment = Segment {
        source: SocketAddr::new(source, tcp.port_source),
        destination: SocketAddr::new(destination, tcp.port_destination),
        sequence: tcp.sequence_number,
        acknowledgement: tcp.acknowledgement_number,
        syn: tcp.flags.syn,
        ack: tcp.flags.acknowledgment,
        push: tcp.flags.push,
        reset: tcp.flags.reset,
        fin: tcp.flags.fin,
        payload_length: tcp.payload_length,
    };

    let frame_length = dissection.reader.data().len();
    dissection
        .resolver
        .track_tcp(dissection.index, frame_length, &segment)
}

pub fn best_children(dissection: &Dissection, node: NodeId) -> Option<ProtocolId> {
    let layer = match dissection.data(node) {
        Some(ProtocolData::TCP(value)) => value,
        _ => return None,
    };
    let options = dissection.options;

    if options.decode_tls && !layer.track.as_ref().is_some_and(|track| track.is_dump) {
        let pending = layer
            .track
            .as_ref()
            .and_then(|track| {
                let connection = dissection.resolver.connection(&track.key)?;
                connection.stacks.get(track.direction)
            })
            .is_some_and(|stack| !stack.temp.is_empty());
        if (pending && !dissection.reader.is_empty())
            || tls::sniff(dissection.reader.remaining())
        {
            return Some(ProtocolId::TLS);
        }
    }

    if dissection.reader.is_empty() {
        return None;
    }

    if options.decode_http && http::sniff(&dissection.reader) {
        return Some(ProtocolId::HTTP);
    }

    if options.decode_dns && dns::is_dns_port(layer.port_source, layer.port_destination) {
        return Some(ProtocolId::DNS);
    }

    None
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TCP {
    pub port_source: u16,
    pub port_destination: u16,
    pub sequence_number: u32,
    pub acknowledgement_number: u32,
    pub data_offset: u16,
    pub reserved: u8,
    pub flags: Flags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    pub options: Vec<OptionData>,
    pub payload_length: usize,
    pub track: Option<TcpTrack>,
}

impl HasPorts for TCP {
    fn source_port(&self) -> u16 {
        self.port_source
    }

    fn destination_port(&self) -> u16 {
        self.port_destination
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Flags {
    pub congestion_window_reduced: bool,
    pub ecn_echo: bool,
    pub urgent: bool,
    pub acknowledgment: bool,
    pub push: bool,
    pub reset: bool,
    pub syn: bool,
    pub fin: bool,
}

impl From<u8> for Flags {
    fn from(value: u8) -> Self {
        Self {
            congestion_window_reduced: value & 0b1000_0000 != 0,
            ecn_echo: value & 0b0100_0000 != 0,
            urgent: value & 0b0010_0000 != 0,
            acknowledgment: value & 0b0001_0000 != 0,
            push: value & 0b0000_1000 != 0,
            reset: value & 0b0000_0100 != 0,
            syn: value & 0b0000_0010 != 0,
            fin: value & 0b0000_0001 != 0,
        }
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (self.congestion_window_reduced, "CWR"),
            (self.ecn_echo, "ECE"),
            (self.urgent, "URG"),
            (self.acknowledgment, "ACK"),
            (self.push, "PSH"),
            (self.reset, "RST"),
            (self.syn, "SYN"),
            (self.fin, "FIN"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| *flag)
            .map(|(_, name)| *name)
            .collect();

        write!(f, "[{}]", set.join(", "))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum OptionId {
    EndOfOptionList = 0,
    NoOperation = 1,
    MaximumSegmentSize = 2,
    WindowScaling = 3,
    SAckPermitted = 4,
    SAck = 5,

    Timestamps = 8,
    FastOpen = 34,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum OptionData {
    EndOfOptionList,
    NoOperation,
    MaximumSegmentSize(u16),
    WindowScaling(u8),
    SAckPermitted,
    SAck(Vec<(u32, u32)>),
    Timestamps(u32, u32),
    FastOpen(String),
    Unknown { kind: u8, data: String },
}
