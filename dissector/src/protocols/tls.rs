use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::{ByteSource, NodeId};
use crate::parser::Dissection;
use crate::protocols::ProtocolData;
use crate::reader::Reader;
use log::debug;
use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

// TLS Protocol, records and the unencrypted part of the handshake.
// RFC 5246: https://datatracker.ietf.org/doc/html/rfc5246
// RFC 8446: https://datatracker.ietf.org/doc/html/rfc8446

pub const RECORD_HEADER_LENGTH: usize = 5;
pub const HANDSHAKE_HEADER_LENGTH: usize = 4;
pub const RANDOM_LENGTH: usize = 32;

// Content type range, version major 3, minor below 5.
fn plausible_header(bytes: &[u8]) -> bool {
    let content_type = match bytes.first() {
        Some(value) => *value,
        None => return false,
    };

    (20..=24).contains(&content_type)
        && bytes.get(1).is_none_or(|major| *major == 3)
        && bytes.get(2).is_none_or(|minor| *minor < 5)
}

/// Whether `bytes` start with something shaped like a TLS record header.
/// Nothing is consumed.
pub fn sniff(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && plausible_header(bytes)
}

/// Decodes the records at the cursor. Bytes of a record cut by the segment
/// end are stashed in the sending direction of the flow and glued in front of
/// the next payload of that direction.
pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let track = match dissection.data(parent) {
        Some(ProtocolData::TCP(tcp)) => tcp.track.clone(),
        _ => None,
    };

    let (temp, mut encrypted) = match track
        .as_ref()
        .and_then(|track| dissection.resolver.stack_mut(track))
    {
        Some(stack) => (std::mem::take(&mut stack.temp), stack.encrypted),
        None => (vec![], false),
    };

    let mut tls = TLS::default();
    let mut pending = vec![];

    let (fields, source, result) = if temp.is_empty() {
        let mut fields = FieldReader::new(&mut dissection.reader);
        let result = read(&mut fields, &mut tls, &mut encrypted, &mut pending);
        (fields.into_fields(), ByteSource::Frame, result)
    } else {
        let mut buffer = temp;
        buffer.extend_from_slice(dissection.reader.rest());
        tls.reassembled = true;

        let (fields, result) = {
            let mut reader = Reader::new(&buffer);
            let mut fields = FieldReader::new(&mut reader);
            let result = read(&mut fields, &mut tls, &mut encrypted, &mut pending);
            (fields.into_fields(), result)
        };
        (fields, ByteSource::Reassembled(buffer), result)
    };

    tls.pending = pending.len();
    let connection = track.as_ref().and_then(|track| {
        let connection = dissection.resolver.connection_mut(&track.key)?;
        Some((track.direction, connection))
    });
    match connection {
        Some((direction, connection)) => {
            connection.is_tls |= !tls.records.is_empty();
            if let Some(stack) = connection.stacks.get_mut(direction) {
                stack.encrypted = encrypted;
                stack.temp = pending;
            }
        },
        None if !pending.is_empty() => debug!(
            "Frame #{}: flow is not tracked, {} bytes of a split TLS record dropped.",
            dissection.index,
            pending.len()
        ),
        None => {},
    }

    dissection.link_from(parent, ProtocolData::TLS(tls), fields, source, result)
}

fn read(
    fields: &mut FieldReader, tls: &mut TLS, encrypted: &mut bool, pending: &mut Vec<u8>,
) -> Result<(), DissectError> {
    while !fields.reader().is_empty() {
        let left = fields.left();
        let header = fields
            .reader()
            .peek(RECORD_HEADER_LENGTH.min(left))
            .unwrap_or_default();
        if !plausible_header(header) {
            break;
        }

        let size = fields
            .reader()
            .peek_u16(3)
            .map(|length| RECORD_HEADER_LENGTH + length as usize)
            .filter(|size| *size <= left);
        let size = match size {
            Some(value) => value,
            None => {
                *pending = fields.take("Pending Record", left)?.to_vec();
                break;
            },
        };

        let record = fields.window("Record", size, |fields| read_record(fields, encrypted))?;
        tls.records.push(record);
    }

    Ok(())
}

fn read_record(fields: &mut FieldReader, encrypted: &mut bool) -> Result<TlsRecord, DissectError> {
    let content_type = fields.u8_as("Content Type", |kind| {
        format!("{} ({})", ContentType::from(*kind), kind)
    })?;
    let version = fields.u16_as("Version", render_version)?;
    let length = fields.u16("Length")?;

    let mut record = TlsRecord {
        content_type: ContentType::from(content_type),
        version: TlsVersion::from(version),
        length,
        payload: fields.reader().remaining().to_vec(),
        messages: vec![],
    };

    match record.content_type {
        ContentType::Handshake if !*encrypted => {
            record.messages = read_handshakes(fields)?;
        },
        ContentType::ChangeCipherSpec => *encrypted = true,
        _ => {},
    }

    skip_rest(fields, "Data")?;
    Ok(record)
}

fn read_handshakes(fields: &mut FieldReader) -> Result<Vec<HandshakeMessage>, DissectError> {
    let mut messages = vec![];

    loop {
        let length = match fields.reader().peek(HANDSHAKE_HEADER_LENGTH) {
            Some([_, high, middle, low]) => u32::from_be_bytes([0, *high, *middle, *low]),
            _ => break,
        };
        let size = HANDSHAKE_HEADER_LENGTH + length as usize;
        if size > fields.left() {
            break;
        }

        let message = fields.window("Handshake", size, read_handshake)?;
        messages.push(message);
    }

    Ok(messages)
}

fn read_handshake(fields: &mut FieldReader) -> Result<HandshakeMessage, DissectError> {
    let kind = fields.u8_as("Handshake Type", |kind| {
        format!("{} ({})", HandshakeType::from(*kind), kind)
    })?;
    let length = fields.u24("Length")?;

    let message = match HandshakeType::from(kind) {
        HandshakeType::ClientHello => HandshakeMessage::ClientHello(read_client_hello(fields)?),
        HandshakeType::ServerHello => HandshakeMessage::ServerHello(read_server_hello(fields)?),
        kind => HandshakeMessage::Other { kind, length },
    };

    skip_rest(fields, "Body")?;
    Ok(message)
}

fn read_client_hello(fields: &mut FieldReader) -> Result<ClientHello, DissectError> {
    let mut hello = ClientHello {
        version: TlsVersion::from(fields.u16_as("Version", render_version)?),
        random: fields.hex("Random", RANDOM_LENGTH)?,
        ..Default::default()
    };

    let session_length = fields.u8("Session ID Length")? as usize;
    hello.session_id = fields.hex("Session ID", session_length)?;

    let suites_length = fields.u16("Cipher Suites Length")? as usize;
    let suites_length = fits(fields, suites_length)?;
    hello.cipher_suites = fields.window("Cipher Suites", suites_length, |fields| {
        let mut suites = vec![];
        while fields.left() >= 2 {
            suites.push(CipherSuite::from(fields.u16_as("Cipher Suite", render_suite)?));
        }
        skip_rest(fields, "Padding")?;
        Ok::<_, DissectError>(suites)
    })?;

    let methods_length = fields.u8("Compression Methods Length")? as usize;
    hello.compression_methods = fields.take("Compression Methods", methods_length)?.to_vec();

    hello.extensions = read_extensions(fields, false)?;
    Ok(hello)
}

fn read_server_hello(fields: &mut FieldReader) -> Result<ServerHello, DissectError> {
    let mut hello = ServerHello {
        version: TlsVersion::from(fields.u16_as("Version", render_version)?),
        random: fields.hex("Random", RANDOM_LENGTH)?,
        ..Default::default()
    };

    let session_length = fields.u8("Session ID Length")? as usize;
    hello.session_id = fields.hex("Session ID", session_length)?;
    hello.cipher_suite = CipherSuite::from(fields.u16_as("Cipher Suite", render_suite)?);
    hello.compression_method = fields.u8("Compression Method")?;

    hello.extensions = read_extensions(fields, true)?;
    Ok(hello)
}

// Extensions are optional: a hello may end right after the compression methods.
fn read_extensions(fields: &mut FieldReader, server: bool) -> Result<Vec<Extension>, DissectError> {
    if fields.left() < 2 {
        return Ok(vec![]);
    }

    let length = fields.u16("Extensions Length")? as usize;
    let length = fits(fields, length)?;
    fields.window("Extensions", length, |fields| {
        let mut extensions = vec![];
        while fields.left() >= 4 {
            let length = fields.reader().peek_u16(2).unwrap_or_default() as usize;
            let size = fits(fields, 4 + length)?;
            extensions.push(fields.window("Extension", size, |fields| {
                read_extension(fields, server)
            })?);
        }
        skip_rest(fields, "Padding")?;
        Ok(extensions)
    })
}

fn read_extension(fields: &mut FieldReader, server: bool) -> Result<Extension, DissectError> {
    let kind = fields.u16_as("Type", |kind| {
        format!("{} ({})", ExtensionType::from(*kind), kind)
    })?;
    let kind = ExtensionType::from(kind);
    let length = fields.u16("Length")?;

    let data = match kind {
        _ if length == 0 => ExtensionData::Empty,
        ExtensionType::ServerName => read_server_name(fields)?,
        ExtensionType::ALPN => read_alpn(fields)?,
        ExtensionType::SupportedVersions if server => {
            let version = fields.u16_as("Supported Version", render_version)?;
            ExtensionData::SupportedVersions(vec![TlsVersion::from(version)])
        },
        ExtensionType::SupportedVersions => {
            fields.u8("Supported Versions Length")?;
            let mut versions = vec![];
            while fields.left() >= 2 {
                versions.push(TlsVersion::from(fields.u16_as("Supported Version", render_version)?));
            }
            ExtensionData::SupportedVersions(versions)
        },
        _ => {
            let left = fields.left();
            ExtensionData::Raw(fields.hex("Data", left)?)
        },
    };

    skip_rest(fields, "Data")?;
    Ok(Extension { kind, length, data })
}

// RFC 6066, 3. Server Name Indication
fn read_server_name(fields: &mut FieldReader) -> Result<ExtensionData, DissectError> {
    fields.u16("Server Name List Length")?;

    let mut host = String::new();
    while fields.left() >= 3 {
        let kind = fields.u8("Server Name Type")?;
        let length = fields.u16("Server Name Length")? as usize;
        let name = fields.string("Server Name", length)?;
        // host_name
        if kind == 0 && host.is_empty() {
            host = name;
        }
    }

    Ok(ExtensionData::ServerName(host))
}

// RFC 7301, 3.1. The Application-Layer Protocol Negotiation Extension
fn read_alpn(fields: &mut FieldReader) -> Result<ExtensionData, DissectError> {
    fields.u16("ALPN Extension Length")?;

    let mut protocols = vec![];
    while fields.left() >= 1 {
        let length = fields.u8("ALPN String Length")? as usize;
        protocols.push(fields.string("ALPN Next Protocol", length)?);
    }

    Ok(ExtensionData::Alpn(protocols))
}

fn fits(fields: &FieldReader, length: usize) -> Result<usize, DissectError> {
    if length > fields.left() {
        return Err(DissectError::Verify("TLS length exceeds the enclosing structure"));
    }
    Ok(length)
}

fn skip_rest(fields: &mut FieldReader, name: &str) -> Result<(), DissectError> {
    let left = fields.left();
    if left > 0 {
        fields.skip(name, left)?;
    }
    Ok(())
}

fn render_version(version: &u16) -> String {
    format!("{} (0x{:04x})", TlsVersion::from(*version), version)
}

fn render_suite(suite: &u16) -> String {
    format!("{} (0x{:04x})", CipherSuite::from(*suite), suite)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TLS {
    pub records: Vec<TlsRecord>,
    // Decoded from bytes stashed by earlier segments plus this payload.
    pub reassembled: bool,
    // Bytes of an incomplete record kept for the next segment.
    pub pending: usize,
}

impl TLS {
    pub fn messages(&self) -> impl Iterator<Item = &HandshakeMessage> {
        self.records.iter().flat_map(|record| record.messages.iter())
    }

    pub fn client_hello(&self) -> Option<&ClientHello> {
        self.messages().find_map(|message| match message {
            HandshakeMessage::ClientHello(hello) => Some(hello),
            _ => None,
        })
    }

    pub fn server_hello(&self) -> Option<&ServerHello> {
        self.messages().find_map(|message| match message {
            HandshakeMessage::ServerHello(hello) => Some(hello),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsRecord {
    pub content_type: ContentType,
    pub version: TlsVersion,
    pub length: u16,
    #[serde(with = "hex")]
    pub payload: Vec<u8>,
    pub messages: Vec<HandshakeMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Other { kind: HandshakeType, length: u32 },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientHello {
    pub version: TlsVersion,
    pub random: String,
    pub session_id: String,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    fn extension(&self, kind: ExtensionType) -> Option<&ExtensionData> {
        self.extensions
            .iter()
            .find(|extension| extension.kind == kind)
            .map(|extension| &extension.data)
    }

    pub fn server_name(&self) -> Option<&str> {
        match self.extension(ExtensionType::ServerName) {
            Some(ExtensionData::ServerName(name)) => Some(name),
            _ => None,
        }
    }

    pub fn alpn(&self) -> Option<&[String]> {
        match self.extension(ExtensionType::ALPN) {
            Some(ExtensionData::Alpn(protocols)) => Some(protocols),
            _ => None,
        }
    }

    pub fn supported_versions(&self) -> Option<&[TlsVersion]> {
        match self.extension(ExtensionType::SupportedVersions) {
            Some(ExtensionData::SupportedVersions(versions)) => Some(versions),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerHello {
    pub version: TlsVersion,
    pub random: String,
    pub session_id: String,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    /// Negotiated version: supported_versions when present (TLS 1.3),
    /// the legacy field otherwise.
    pub fn selected_version(&self) -> TlsVersion {
        self.extensions
            .iter()
            .find_map(|extension| match &extension.data {
                ExtensionData::SupportedVersions(versions) => versions.first().copied(),
                _ => None,
            })
            .unwrap_or(self.version)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Extension {
    pub kind: ExtensionType,
    pub length: u16,
    pub data: ExtensionData,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ExtensionData {
    ServerName(String),
    Alpn(Vec<String>),
    SupportedVersions(Vec<TlsVersion>),
    Empty,
    // Undecoded extension data in hex.
    Raw(String),
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
    Heartbeat = 24,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u16)]
pub enum TlsVersion {
    #[strum(to_string = "SSL 3.0")]
    Ssl3 = 0x0300,
    #[strum(to_string = "TLS 1.0")]
    Tls10 = 0x0301,
    #[strum(to_string = "TLS 1.1")]
    Tls11 = 0x0302,
    #[strum(to_string = "TLS 1.2")]
    Tls12 = 0x0303,
    #[strum(to_string = "TLS 1.3")]
    Tls13 = 0x0304,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for TlsVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EncryptedExtensions = 8,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,

    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    TLS_RSA_WITH_AES_128_CBC_SHA = 0x002F,
    TLS_RSA_WITH_AES_256_CBC_SHA = 0x0035,
    TLS_RSA_WITH_AES_128_GCM_SHA256 = 0x009C,
    TLS_RSA_WITH_AES_256_GCM_SHA384 = 0x009D,
    TLS_EMPTY_RENEGOTIATION_INFO_SCSV = 0x00FF,
    TLS_AES_128_GCM_SHA256 = 0x1301,
    TLS_AES_256_GCM_SHA384 = 0x1302,
    TLS_CHACHA20_POLY1305_SHA256 = 0x1303,
    TLS_FALLBACK_SCSV = 0x5600,
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA = 0xC013,
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA = 0xC014,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 = 0xC02B,
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 = 0xC02C,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 = 0xC02F,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 = 0xC030,
    TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 = 0xCCA8,
    TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 = 0xCCA9,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, FromPrimitive)]
#[repr(u16)]
pub enum ExtensionType {
    ServerName = 0,
    MaxFragmentLength = 1,
    StatusRequest = 5,
    SupportedGroups = 10,
    EcPointFormats = 11,
    SignatureAlgorithms = 13,
    ALPN = 16,
    SignedCertificateTimestamp = 18,
    Padding = 21,
    ExtendedMasterSecret = 23,
    SessionTicket = 35,
    PreSharedKey = 41,
    SupportedVersions = 43,
    PskKeyExchangeModes = 45,
    KeyShare = 51,
    RenegotiationInfo = 0xFF01,

    #[num_enum(catch_all)]
    Unknown(u16),
}
