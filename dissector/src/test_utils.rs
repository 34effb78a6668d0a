use crate::capture::{
    BLOCK_ENHANCED_PACKET, BLOCK_INTERFACE_DESCRIPTION, BLOCK_SECTION_HEADER,
    BYTE_ORDER_MAGIC, MAGIC_PCAP_MICROSECONDS,
};
use crate::frame::{Frame, FrameHeader};
use crate::options::Options;
use crate::parser::ProtocolParser;
use crate::resolver::Resolver;
use std::net::SocketAddrV4;

pub fn dissect(link_type: u16, hex: &str) -> Frame {
    let mut resolver = Resolver::new();
    dissect_with(&mut resolver, link_type, hex)
}

pub fn dissect_with(resolver: &mut Resolver, link_type: u16, hex: &str) -> Frame {
    let data = hex::decode(hex.replace(" ", "")).unwrap();
    dissect_bytes(resolver, 1, link_type, data)
}

pub fn dissect_bytes(
    resolver: &mut Resolver, index: usize, link_type: u16, data: Vec<u8>,
) -> Frame {
    let header = FrameHeader {
        captured_length: data.len() as u32,
        original_length: data.len() as u32,
        ..Default::default()
    };
    ProtocolParser::new(link_type).process(index, header, data, resolver, &Options::default())
}

/// Raw IPv4 datagram carrying one TCP segment, for link type 228.
pub fn ipv4_tcp(
    source: &str, destination: &str, sequence: u32, flags: u8, payload: &[u8],
) -> Vec<u8> {
    let source: SocketAddrV4 = source.parse().unwrap();
    let destination: SocketAddrV4 = destination.parse().unwrap();

    let total_length = (20 + 20 + payload.len()) as u16;
    let mut data = vec![0x45, 0x00];
    data.extend(total_length.to_be_bytes());
    data.extend([0x00, 0x01, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
    data.extend(source.ip().octets());
    data.extend(destination.ip().octets());

    data.extend(source.port().to_be_bytes());
    data.extend(destination.port().to_be_bytes());
    data.extend(sequence.to_be_bytes());
    data.extend(0u32.to_be_bytes());
    data.extend([0x50, flags, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]);
    data.extend(payload);
    data
}

/// Little-endian microsecond pcap with one record per frame, timestamps
/// counting seconds from 1.
pub fn pcap_file(link_type: u32, frames: &[&[u8]]) -> Vec<u8> {
    let mut file = MAGIC_PCAP_MICROSECONDS.to_le_bytes().to_vec();
    file.extend(2u16.to_le_bytes());
    file.extend(4u16.to_le_bytes());
    file.extend([0u8; 8]);
    file.extend(65535u32.to_le_bytes());
    file.extend(link_type.to_le_bytes());

    for (seconds, frame) in frames.iter().enumerate() {
        file.extend((seconds as u32 + 1).to_le_bytes());
        file.extend(500u32.to_le_bytes());
        file.extend((frame.len() as u32).to_le_bytes());
        file.extend((frame.len() as u32).to_le_bytes());
        file.extend(*frame);
    }
    file
}

pub fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let length = (body.len() + 12) as u32;
    let mut block = block_type.to_le_bytes().to_vec();
    block.extend(length.to_le_bytes());
    block.extend(body);
    block.extend(length.to_le_bytes());
    block
}

pub fn pcapng_option(code: u16, value: &[u8]) -> Vec<u8> {
    let mut option = code.to_le_bytes().to_vec();
    option.extend((value.len() as u16).to_le_bytes());
    option.extend(value);
    option.resize(option.len() + (4 - value.len() % 4) % 4, 0);
    option
}

pub fn section_header() -> Vec<u8> {
    let mut body = BYTE_ORDER_MAGIC.to_le_bytes().to_vec();
    body.extend(1u16.to_le_bytes());
    body.extend(0u16.to_le_bytes());
    body.extend(u64::MAX.to_le_bytes());
    pcapng_block(BLOCK_SECTION_HEADER, &body)
}

pub fn interface_description(link_type: u16, options: &[u8]) -> Vec<u8> {
    let mut body = link_type.to_le_bytes().to_vec();
    body.extend(0u16.to_le_bytes());
    body.extend(65535u32.to_le_bytes());
    body.extend(options);
    pcapng_block(BLOCK_INTERFACE_DESCRIPTION, &body)
}

pub fn enhanced_packet(interface: u32, timestamp: u64, data: &[u8]) -> Vec<u8> {
    let mut body = interface.to_le_bytes().to_vec();
    body.extend(((timestamp >> 32) as u32).to_le_bytes());
    body.extend((timestamp as u32).to_le_bytes());
    body.extend((data.len() as u32).to_le_bytes());
    body.extend((data.len() as u32).to_le_bytes());
    body.extend(data);
    body.resize(body.len() + (4 - data.len() % 4) % 4, 0);
    pcapng_block(BLOCK_ENHANCED_PACKET, &body)
}

/// Section header, one interface and one Enhanced Packet block per frame.
pub fn pcapng_file(link_type: u16, frames: &[&[u8]]) -> Vec<u8> {
    let mut file = section_header();
    file.extend(interface_description(link_type, &[]));
    for (index, frame) in frames.iter().enumerate() {
        file.extend(enhanced_packet(0, (index as u64 + 1) * 1_000_000, frame));
    }
    file
}
