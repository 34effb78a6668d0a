use crate::error::ReadError;
use nom::Parser;
use nom::bytes::{tag, take, take_until};
use nom::number::{be_u8, be_u16, be_u24, be_u32, be_u64, le_u16, le_u32, le_u64};
use nom::sequence::terminated;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

pub const CRLF: &str = "\r\n";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Forward-only cursor over an immutable byte slice.
///
/// All reads fail with [`ReadError::OutOfBounds`] instead of panicking when
/// the slice is exhausted; the cursor is left untouched on failure. Peeks
/// never move the cursor.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            end: data.len(),
        }
    }

    pub fn at(data: &'a [u8], position: usize) -> Self {
        let mut reader = Self::new(data);
        reader.position = position.min(data.len());
        reader
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn left(&self) -> usize {
        self.end.saturating_sub(self.position)
    }

    pub fn is_empty(&self) -> bool {
        self.left() == 0
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.data.get(self.position..self.end).unwrap_or(&[])
    }

    pub fn seek(&mut self, position: usize) -> Result<(), ReadError> {
        if position > self.end {
            return Err(self.out_of_bounds(position.saturating_sub(self.position)));
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, length: usize) -> Result<(), ReadError> {
        let target = self
            .position
            .checked_add(length)
            .ok_or(self.out_of_bounds(length))?;
        if target > self.end {
            return Err(self.out_of_bounds(length));
        }
        self.position = target;
        Ok(())
    }

    /// Takes everything left in the window.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.position = self.end.max(self.position);
        rest
    }

    /// Shrinks the readable window to `length` bytes from the cursor.
    /// Used to cut link-layer padding once a network header declares its length.
    pub fn narrow(&mut self, length: usize) {
        let end = self.position.saturating_add(length);
        if end < self.end {
            self.end = end;
        }
    }

    /// Restores a window end saved before [`Reader::narrow`].
    pub fn widen(&mut self, end: usize) {
        self.end = end.min(self.data.len()).max(self.position);
    }

    fn out_of_bounds(&self, requested: usize) -> ReadError {
        ReadError::OutOfBounds {
            position: self.position,
            requested,
            available: self.left(),
        }
    }

    fn apply<O, P>(&mut self, requested: usize, mut parser: P) -> Result<O, ReadError>
    where
        P: Parser<&'a [u8], Output = O, Error = nom::error::Error<&'a [u8]>>,
    {
        let input = self.remaining();
        match parser.parse(input) {
            Ok((rest, value)) => {
                self.position += input.len() - rest.len();
                Ok(value)
            },
            Err(_) => Err(self.out_of_bounds(requested)),
        }
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        self.apply(1, be_u8())
    }

    pub fn u16(&mut self) -> Result<u16, ReadError> {
        self.read_u16(Endian::Big)
    }

    pub fn u24(&mut self) -> Result<u32, ReadError> {
        self.apply(3, be_u24())
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        self.read_u32(Endian::Big)
    }

    pub fn u64(&mut self) -> Result<u64, ReadError> {
        self.read_u64(Endian::Big)
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16, ReadError> {
        match endian {
            Endian::Big => self.apply(2, be_u16()),
            Endian::Little => self.apply(2, le_u16()),
        }
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32, ReadError> {
        match endian {
            Endian::Big => self.apply(4, be_u32()),
            Endian::Little => self.apply(4, le_u32()),
        }
    }

    pub fn read_u64(&mut self, endian: Endian) -> Result<u64, ReadError> {
        match endian {
            Endian::Big => self.apply(8, be_u64()),
            Endian::Little => self.apply(8, le_u64()),
        }
    }

    pub fn take(&mut self, length: usize) -> Result<&'a [u8], ReadError> {
        self.apply(length, take(length))
    }

    pub fn string(&mut self, length: usize) -> Result<String, ReadError> {
        let position = self.position;
        let bytes = self.take(length)?;
        match std::str::from_utf8(bytes) {
            Ok(value) => Ok(value.to_string()),
            Err(_) => {
                self.position = position;
                Err(ReadError::InvalidText { position })
            },
        }
    }

    /// Reads a `u8` length prefix followed by that many bytes of text.
    pub fn prefixed_string(&mut self) -> Result<String, ReadError> {
        let position = self.position;
        let length = self.u8()?;
        self.string(length as usize).inspect_err(|_| {
            self.position = position;
        })
    }

    /// Reads a CRLF-terminated line, consuming the terminator.
    pub fn line(&mut self) -> Result<String, ReadError> {
        let position = self.position;
        let input = self.remaining();
        let result: nom::IResult<&[u8], &[u8]> =
            terminated(take_until(CRLF), tag(CRLF)).parse(input);
        let (rest, line) =
            result.map_err(|_| ReadError::DelimiterNotFound { position })?;
        let line = std::str::from_utf8(line)
            .map_err(|_| ReadError::InvalidText { position })?
            .to_string();
        self.position += input.len() - rest.len();

        Ok(line)
    }

    /// Reads until `delimiter`, consuming it. The delimiter is not part of the result.
    pub fn until(&mut self, delimiter: u8) -> Result<&'a [u8], ReadError> {
        let position = self.position;
        let input = self.remaining();
        let index = input
            .iter()
            .position(|byte| *byte == delimiter)
            .ok_or(ReadError::DelimiterNotFound { position })?;
        self.position += index + 1;

        Ok(&input[..index])
    }

    pub fn hex(&mut self, length: usize) -> Result<String, ReadError> {
        self.take(length).map(hex::encode)
    }

    pub fn mac(&mut self) -> Result<[u8; 6], ReadError> {
        let bytes = self.take(6)?;
        let mut mac = [0u8; 6];
        mac.copy_from_slice(bytes);
        Ok(mac)
    }

    pub fn ipv4(&mut self) -> Result<Ipv4Addr, ReadError> {
        let bytes = self.take(4)?;
        let mut address = [0u8; 4];
        address.copy_from_slice(bytes);
        Ok(Ipv4Addr::from(address))
    }

    pub fn ipv6(&mut self) -> Result<Ipv6Addr, ReadError> {
        let bytes = self.take(16)?;
        let mut address = [0u8; 16];
        address.copy_from_slice(bytes);
        Ok(Ipv6Addr::from(address))
    }

    pub fn peek_u8(&self, offset: usize) -> Option<u8> {
        let index = self.position.checked_add(offset)?;
        if index >= self.end {
            return None;
        }
        self.data.get(index).copied()
    }

    pub fn peek_u16(&self, offset: usize) -> Option<u16> {
        let high = self.peek_u8(offset)?;
        let low = self.peek_u8(offset.checked_add(1)?)?;
        Some(u16::from_be_bytes([high, low]))
    }

    pub fn peek(&self, length: usize) -> Option<&'a [u8]> {
        self.remaining().get(..length)
    }

    /// First `delimiter`-terminated token within `max` bytes, without consuming it.
    pub fn peek_token(&self, max: usize, delimiter: u8) -> Option<&'a str> {
        let window = self.remaining();
        let window = window.get(..max.min(window.len()))?;
        let index = window.iter().position(|byte| *byte == delimiter)?;
        std::str::from_utf8(&window[..index]).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_reads() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u16(Endian::Little).unwrap(), 0x3412);
        assert_eq!(reader.u16().unwrap(), 0x5678);
        assert!(reader.is_empty());

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u32(Endian::Big).unwrap(), 0x12345678);
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u32(Endian::Little).unwrap(), 0x78563412);
    }

    #[test]
    fn test_out_of_bounds_keeps_cursor() {
        let bytes = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&bytes);
        reader.u8().unwrap();
        let err = reader.u32().unwrap_err();
        assert_eq!(
            err,
            ReadError::OutOfBounds {
                position: 1,
                requested: 4,
                available: 2,
            }
        );
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.u16().unwrap(), 0x0203);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let bytes = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
        let reader = Reader::new(bytes);
        assert_eq!(reader.peek_token(10, b' '), Some("GET"));
        assert_eq!(reader.peek_u8(0), Some(b'G'));
        assert_eq!(reader.peek(3), Some(&b"GET"[..]));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_peek_token_respects_window() {
        let bytes = b"ABCDEFGHIJKLMNOP QRS";
        let reader = Reader::new(bytes);
        assert_eq!(reader.peek_token(10, b' '), None);
    }

    #[test]
    fn test_lines() {
        let bytes = b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\nbody";
        let mut reader = Reader::new(bytes);
        assert_eq!(reader.line().unwrap(), "HTTP/1.1 200 OK");
        assert_eq!(reader.line().unwrap(), "Server: x");
        assert_eq!(reader.line().unwrap(), "");
        assert_eq!(reader.remaining(), b"body");
        assert!(matches!(
            reader.line(),
            Err(ReadError::DelimiterNotFound { .. })
        ));
    }

    #[test]
    fn test_narrow_cuts_padding() {
        let bytes = [1, 2, 3, 4, 0, 0, 0];
        let mut reader = Reader::new(&bytes);
        reader.u8().unwrap();
        reader.narrow(3);
        assert_eq!(reader.left(), 3);
        assert_eq!(reader.remaining(), &[2, 3, 4]);
        reader.narrow(10);
        assert_eq!(reader.left(), 3);
    }

    #[test]
    fn test_addresses() {
        let bytes = [0x00, 0x1A, 0x8C, 0x10, 0xAD, 0x30, 0xC0, 0xA8, 0x00, 0x01];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.mac().unwrap(), [0x00, 0x1A, 0x8C, 0x10, 0xAD, 0x30]);
        assert_eq!(reader.ipv4().unwrap(), Ipv4Addr::new(192, 168, 0, 1));
    }
}
