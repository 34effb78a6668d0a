use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ProtocolData;
use crate::protocols::dns::name::StringRef;
use crate::reader::Reader;
use crate::resolver::dns::DnsRecord;
use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use strum_macros::Display;

// DNS Protocol
// RFC 1035: https://datatracker.ietf.org/doc/html/rfc1035

pub const PORT_DNS: u16 = 53;
pub const PORT_MDNS: u16 = 5353;
pub const HEADER_LENGTH: usize = 12;

pub fn is_dns_port(port_source: u16, port_destination: u16) -> bool {
    [PORT_DNS, PORT_MDNS]
        .iter()
        .any(|port| *port == port_source || *port == port_destination)
}

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let over_tcp = matches!(dissection.data(parent), Some(ProtocolData::TCP(_)));

    let mut dns = DNS::default();
    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut dns, over_tcp);
    let fields = fields.into_fields();

    if result.is_ok() && dns.header.message_type == MessageType::Response {
        register(dissection, parent, &dns);
    }

    dissection.link(parent, ProtocolData::DNS(dns), fields, result)
}

fn read(fields: &mut FieldReader, dns: &mut DNS, over_tcp: bool) -> Result<(), DissectError> {
    // RFC 1035, 4.2.2. TCP usage: message is prefixed with a two byte length field.
    if over_tcp {
        let length = fields.u16("Length")?;
        fields.reader_mut().narrow(length as usize);
    }

    // Pointers are offsets from the first header byte.
    let message = Message {
        bytes: fields.reader().remaining(),
        base: fields.position(),
    };
    if message.bytes.len() < HEADER_LENGTH {
        return Err(DissectError::Verify("DNS message is shorter than its header"));
    }

    dns.header = fields.group("Header", read_header)?;

    for _ in 0..dns.header.question_entries {
        let question = fields.group("Question", |fields| read_question(fields, &message))?;
        dns.question_section.push(question);
    }
    for _ in 0..dns.header.answer_records {
        let record = fields.group("Answer", |fields| read_record(fields, &message))?;
        dns.answer_section.push(record);
    }
    for _ in 0..dns.header.authority_records {
        let record = fields.group("Authority", |fields| read_record(fields, &message))?;
        dns.authority_section.push(record);
    }
    for _ in 0..dns.header.additional_records {
        let record = fields.group("Additional", |fields| read_record(fields, &message))?;
        dns.additional_section.push(record);
    }

    Ok(())
}

fn read_header(fields: &mut FieldReader) -> Result<Header, DissectError> {
    let id = fields.u16_as("Transaction ID", |id| format!("0x{:04x}", id))?;

    // QR (1), OPCODE (4), AA (1), TC (1), RD (1), RA (1), Z (3), RCODE (4)
    let flags = fields.u16_as("Flags", |flags| format!("0x{:04x}", flags))?;
    let message_type = match flags >> 15 {
        0 => MessageType::Query,
        _ => MessageType::Response,
    };

    Ok(Header {
        id,
        message_type,
        operation_code: OperationCode::from(((flags >> 11) & 0x0F) as u8),
        authoritative_answer: flags & 0x0400 != 0,
        truncation: flags & 0x0200 != 0,
        recursion_desired: flags & 0x0100 != 0,
        recursion_available: flags & 0x0080 != 0,
        response_code: ResponseCode::from((flags & 0x0F) as u8),

        question_entries: fields.u16("Questions")?,
        answer_records: fields.u16("Answer RRs")?,
        authority_records: fields.u16("Authority RRs")?,
        additional_records: fields.u16("Additional RRs")?,
    })
}

fn read_question(
    fields: &mut FieldReader, message: &Message,
) -> Result<QuestionEntry, DissectError> {
    let name = read_name(fields, message, "Name")?;
    let entry_type =
        fields.u16_as("Type", |code| format!("{} ({})", DnsType::from(*code), code))?;
    let class = fields.u16_as("Class", |code| format!("{} ({})", Class::from(*code), code))?;

    Ok(QuestionEntry {
        name,
        entry_type: DnsType::from(entry_type),
        class: Class::from(class),
    })
}

fn read_record(
    fields: &mut FieldReader, message: &Message,
) -> Result<ResourceRecord, DissectError> {
    let name = read_name(fields, message, "Name")?;
    let record_type =
        fields.u16_as("Type", |code| format!("{} ({})", DnsType::from(*code), code))?;
    let record_type = DnsType::from(record_type);
    let class = fields.u16_as("Class", |code| format!("{} ({})", Class::from(*code), code))?;
    let time_to_live = fields.u32("Time to Live")?;
    let data_length = fields.u16("Data Length")?;

    let start = fields.position();
    let end = start + data_length as usize;
    if data_length as usize > fields.left() {
        return Err(DissectError::Verify("DNS record data exceeds the message"));
    }
    let data = read_data(fields, message, &record_type, data_length as usize)?;

    // A name running past the record would claim bytes of the next one.
    if fields.position() > end {
        return Err(DissectError::Verify("DNS record data overruns its length"));
    }
    // Anything the typed decode left over belongs to this record.
    if fields.position() < end {
        fields.reader_mut().seek(end)?;
    }

    Ok(ResourceRecord {
        name,
        record_type,
        class: Class::from(class),
        time_to_live,
        data_length,
        data,
    })
}

fn read_data(
    fields: &mut FieldReader, message: &Message, record_type: &DnsType, length: usize,
) -> Result<DnsTypeData, DissectError> {
    let data = match (record_type, length) {
        (DnsType::A, 4) => DnsTypeData::A(fields.ipv4("Address")?),
        (DnsType::AAAA, 16) => DnsTypeData::AAAA(fields.ipv6("AAAA Address")?),
        (DnsType::CNAME, _) => DnsTypeData::CNAME(read_name(fields, message, "CNAME")?),
        (DnsType::NS, _) => DnsTypeData::NS(read_name(fields, message, "Name Server")?),
        (DnsType::PTR, _) => DnsTypeData::PTR(read_name(fields, message, "Domain Name")?),
        (DnsType::MX, _) => DnsTypeData::MX {
            preference: fields.u16("Preference")?,
            exchange: read_name(fields, message, "Mail Exchange")?,
        },
        (DnsType::SOA, _) => DnsTypeData::SOA {
            primary_name_server: read_name(fields, message, "Primary Name Server")?,
            mailbox: read_name(fields, message, "Responsible Authority's Mailbox")?,
            serial: fields.u32("Serial Number")?,
            refresh_interval: fields.u32("Refresh Interval")?,
            retry_interval: fields.u32("Retry Interval")?,
            expire_limit: fields.u32("Expire Limit")?,
            minimum_ttl: fields.u32("Minimum TTL")?,
        },
        (_, length) => DnsTypeData::Unknown(fields.hex("Data", length)?),
    };

    Ok(data)
}

struct Message<'a> {
    bytes: &'a [u8],
    // Frame offset of `bytes[0]`.
    base: usize,
}

fn read_name(
    fields: &mut FieldReader, message: &Message, name: &str,
) -> Result<String, DissectError> {
    let start = fields.position();
    let offset = start.saturating_sub(message.base);

    let mut reader = Reader::at(message.bytes, offset);
    let value = StringRef::read(&mut reader)?;
    fields
        .reader_mut()
        .skip(reader.position().saturating_sub(offset))?;

    let resolved = value.resolve(message.bytes).to_string();
    fields.record(name, start, &resolved);

    Ok(resolved)
}

fn register(dissection: &mut Dissection, parent: NodeId, dns: &DNS) {
    let server = {
        let ip = dissection.tree.ip_provider(parent).map(|ip| ip.source_ip());
        let port = dissection
            .tree
            .port_provider(parent)
            .map(|ports| ports.source_port());
        match (ip, port) {
            (Some(ip), Some(port)) => SocketAddr::new(ip, port).to_string(),
            _ => return,
        }
    };

    for answer in &dns.answer_section {
        let value = match &answer.data {
            DnsTypeData::A(address) => address.to_string(),
            DnsTypeData::AAAA(address) => address.to_string(),
            DnsTypeData::CNAME(host) => host.clone(),
            _ => continue,
        };
        dissection.resolver.register_dns(DnsRecord {
            server: server.clone(),
            name: answer.name.clone(),
            record_type: answer.record_type,
            value,
            time_to_live: answer.time_to_live,
            frame: dissection.index,
        });
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DNS {
    pub header: Header,
    pub question_section: Vec<QuestionEntry>,
    pub answer_section: Vec<ResourceRecord>,
    pub authority_section: Vec<ResourceRecord>,
    pub additional_section: Vec<ResourceRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub id: u16,
    pub message_type: MessageType,
    pub operation_code: OperationCode,
    pub authoritative_answer: bool,
    pub truncation: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub response_code: ResponseCode,

    pub question_entries: u16,
    pub answer_records: u16,
    pub authority_records: u16,
    pub additional_records: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntry {
    pub name: String,
    pub entry_type: DnsType,
    pub class: Class,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub record_type: DnsType,
    pub class: Class,
    pub time_to_live: u32,
    pub data_length: u16,
    pub data: DnsTypeData,
}

#[derive(Clone, Copy, Debug, Default, Display, Serialize, Deserialize, PartialEq)]
pub enum MessageType {
    #[default]
    Query,
    Response,
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum OperationCode {
    StandardQuery = 0,
    InverseQuery = 1,
    ServerStatusRequest = 2,
    Notify = 4,
    Update = 5,

    #[num_enum(catch_all)]
    Reserved(u8),
}

impl Default for OperationCode {
    fn default() -> Self {
        Self::StandardQuery
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum ResponseCode {
    NoErrorCondition = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,

    #[num_enum(catch_all)]
    Reserved(u8),
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::NoErrorCondition
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u16)]
pub enum DnsType {
    A = 1,           // A host address
    NS = 2,          // An authoritative name server
    CNAME = 5,       // The canonical name for an alias
    SOA = 6,         // Marks the start of a zone of authority
    NULL = 10,       // A null RR (EXPERIMENTAL)
    WKS = 11,        // A well known service description
    PTR = 12,        // A domain name pointer
    HINFO = 13,      // Host information
    MINFO = 14,      // Mailbox or mail list information
    MX = 15,         // Mail exchange
    TXT = 16,        // Text strings
    AAAA = 28,       // IPv6 address record
    LOC = 29,        // Location record
    SRV = 33,        // Service locator
    NAPTR = 35,      // Naming Authority Pointer
    DNAME = 39,      // Delegation name record
    OPT = 41,        // EDNS(0) pseudo-record
    DS = 43,         // Delegation signer
    RRSIG = 46,      // DNSSEC signature
    NSEC = 47,       // Next Secure record
    DNSKEY = 48,     // DNS Key record
    NSEC3 = 50,      // Next Secure record version 3
    TLSA = 52,       // TLSA certificate association
    SVCB = 64,       // Service Binding
    HTTPS = 65,      // HTTPS Binding
    AXFR = 252,      // A request for a transfer of an entire zone
    ALL = 255,       // A request for all records
    CAA = 257,       // Certification Authority Authorization

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for DnsType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u16)]
pub enum Class {
    IN = 1, // The Internet
    CS = 2, // The CSNET class (Obsolete)
    CH = 3, // The CHAOS class
    HS = 4, // Hesiod [Dyer 87]

    ALL = 255,

    #[num_enum(catch_all)]
    Unknown(u16),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum DnsTypeData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    NS(String),
    PTR(String),
    MX {
        preference: u16,
        exchange: String,
    },
    SOA {
        primary_name_server: String,
        mailbox: String,
        serial: u32,
        refresh_interval: u32,
        retry_interval: u32,
        expire_limit: u32,
        minimum_ttl: u32,
    },
    // Raw RDATA in hex.
    Unknown(String),
}

impl std::fmt::Display for DnsTypeData {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let text = match self {
            DnsTypeData::A(address) => address.to_string(),
            DnsTypeData::AAAA(address) => address.to_string(),
            DnsTypeData::CNAME(value) | DnsTypeData::NS(value) | DnsTypeData::PTR(value) => {
                value.to_string()
            },
            DnsTypeData::MX {
                preference,
                exchange,
            } => format!("{} {}", preference, exchange),
            DnsTypeData::SOA {
                primary_name_server,
                mailbox,
                ..
            } => format!("{} <{}>", primary_name_server, mailbox),
            DnsTypeData::Unknown(data) => data.to_string(),
        };

        write!(f, "{}", text)
    }
}

pub mod name;
