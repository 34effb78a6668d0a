use crate::error::ReadError;
use crate::protocols::ethernet::mac::MacAddress;
use crate::reader::{Endian, Reader};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Byte-addressable description of one decoded value.
///
/// `start` and `length` address the buffer the owning node was decoded
/// from (see [`crate::frame::ByteSource`]). Fields are never consulted by
/// the decoders themselves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub start: usize,
    pub length: usize,
    pub render: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Field>,
}

impl Field {
    pub fn new(
        name: impl Into<String>, start: usize, length: usize, render: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            length,
            render: render.into(),
            children: vec![],
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn find(&self, name: &str) -> Option<&Field> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// Reader wrapper which appends a [`Field`] for every read.
pub struct FieldReader<'r, 'a> {
    reader: &'r mut Reader<'a>,
    fields: Vec<Field>,
}

impl<'r, 'a> FieldReader<'r, 'a> {
    pub fn new(reader: &'r mut Reader<'a>) -> Self {
        Self {
            reader,
            fields: vec![],
        }
    }

    pub fn reader(&self) -> &Reader<'a> {
        &*self.reader
    }

    pub fn reader_mut(&mut self) -> &mut Reader<'a> {
        &mut *self.reader
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn left(&self) -> usize {
        self.reader.left()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Appends a field for bytes consumed by some other means.
    pub fn record(&mut self, name: impl Into<String>, start: usize, render: impl Display) {
        let name = name.into();
        let length = self.reader.position().saturating_sub(start);
        let render = format!("{name}: {render}");
        self.fields.push(Field::new(name, start, length, render));
    }

    fn track<T, F>(&mut self, name: &str, read: F) -> Result<T, ReadError>
    where
        T: Display,
        F: FnOnce(&mut Reader<'a>) -> Result<T, ReadError>,
    {
        let start = self.reader.position();
        let value = read(&mut *self.reader)?;
        self.record(name, start, &value);
        Ok(value)
    }

    fn track_as<T, F, R>(&mut self, name: &str, read: F, render: R) -> Result<T, ReadError>
    where
        F: FnOnce(&mut Reader<'a>) -> Result<T, ReadError>,
        R: FnOnce(&T) -> String,
    {
        let start = self.reader.position();
        let value = read(&mut *self.reader)?;
        let rendered = render(&value);
        self.record(name, start, rendered);
        Ok(value)
    }

    pub fn u8(&mut self, name: &str) -> Result<u8, ReadError> {
        self.track(name, Reader::u8)
    }

    pub fn u16(&mut self, name: &str) -> Result<u16, ReadError> {
        self.track(name, Reader::u16)
    }

    pub fn u24(&mut self, name: &str) -> Result<u32, ReadError> {
        self.track(name, Reader::u24)
    }

    pub fn u32(&mut self, name: &str) -> Result<u32, ReadError> {
        self.track(name, Reader::u32)
    }

    pub fn u64(&mut self, name: &str) -> Result<u64, ReadError> {
        self.track(name, Reader::u64)
    }

    pub fn read_u16(&mut self, name: &str, endian: Endian) -> Result<u16, ReadError> {
        self.track(name, |reader| reader.read_u16(endian))
    }

    pub fn read_u32(&mut self, name: &str, endian: Endian) -> Result<u32, ReadError> {
        self.track(name, |reader| reader.read_u32(endian))
    }

    pub fn u8_as(
        &mut self, name: &str, render: impl FnOnce(&u8) -> String,
    ) -> Result<u8, ReadError> {
        self.track_as(name, Reader::u8, render)
    }

    pub fn u16_as(
        &mut self, name: &str, render: impl FnOnce(&u16) -> String,
    ) -> Result<u16, ReadError> {
        self.track_as(name, Reader::u16, render)
    }

    pub fn u32_as(
        &mut self, name: &str, render: impl FnOnce(&u32) -> String,
    ) -> Result<u32, ReadError> {
        self.track_as(name, Reader::u32, render)
    }

    pub fn take(&mut self, name: &str, length: usize) -> Result<&'a [u8], ReadError> {
        self.track_as(
            name,
            |reader| reader.take(length),
            |bytes| format!("{} bytes", bytes.len()),
        )
    }

    pub fn hex(&mut self, name: &str, length: usize) -> Result<String, ReadError> {
        self.track(name, |reader| reader.hex(length))
    }

    pub fn string(&mut self, name: &str, length: usize) -> Result<String, ReadError> {
        self.track(name, |reader| reader.string(length))
    }

    pub fn line(&mut self, name: &str) -> Result<String, ReadError> {
        self.track(name, Reader::line)
    }

    pub fn mac(&mut self, name: &str) -> Result<MacAddress, ReadError> {
        self.track(name, |reader| reader.mac().map(MacAddress))
    }

    pub fn ipv4(&mut self, name: &str) -> Result<Ipv4Addr, ReadError> {
        self.track(name, Reader::ipv4)
    }

    pub fn ipv6(&mut self, name: &str) -> Result<Ipv6Addr, ReadError> {
        self.track(name, Reader::ipv6)
    }

    pub fn skip(&mut self, name: &str, length: usize) -> Result<(), ReadError> {
        let start = self.reader.position();
        self.reader.skip(length)?;
        self.record(name, start, format!("{length} bytes"));
        Ok(())
    }

    /// Runs `read` and nests every field it records under one parent field.
    /// The group is kept even when `read` fails, so partial structures stay
    /// inspectable.
    pub fn group<T, E>(
        &mut self, name: impl Into<String>, read: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let name = name.into();
        let start = self.reader.position();
        let outer = std::mem::take(&mut self.fields);

        let result = read(self);

        let children = std::mem::replace(&mut self.fields, outer);
        let length = self.reader.position().saturating_sub(start);
        self.fields.push(Field {
            render: name.clone(),
            name,
            start,
            length,
            children,
        });

        result
    }

    /// [`FieldReader::group`] over a window of `length` bytes. Reads inside
    /// can't run past the window, the outer window is restored afterwards.
    pub fn window<T, E>(
        &mut self, name: impl Into<String>, length: usize,
        read: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let end = self.reader.end();
        self.reader.narrow(length);
        let result = self.group(name, read);
        self.reader.widen(end);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_record_offsets() {
        let bytes = [0x00, 0x50, 0xDA, 0x8E, 0xC0, 0xA8, 0x03, 0x83];
        let mut reader = Reader::new(&bytes);
        let mut fields = FieldReader::new(&mut reader);

        assert_eq!(fields.u16("Source Port").unwrap(), 80);
        assert_eq!(fields.u16("Destination Port").unwrap(), 55950);
        assert_eq!(
            fields.ipv4("Address").unwrap(),
            Ipv4Addr::new(192, 168, 3, 131)
        );

        let fields = fields.into_fields();
        assert_eq!(
            fields,
            vec![
                Field::new("Source Port", 0, 2, "Source Port: 80"),
                Field::new("Destination Port", 2, 2, "Destination Port: 55950"),
                Field::new("Address", 4, 4, "Address: 192.168.3.131"),
            ]
        );
    }

    #[test]
    fn test_group_nests_children() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = Reader::new(&bytes);
        let mut fields = FieldReader::new(&mut reader);

        fields.u8("Type").unwrap();
        let result: Result<(), ReadError> = fields.group("Body", |fields| {
            fields.u16("First")?;
            fields.u16("Second")?;
            fields.u16("Third")?;
            Ok(())
        });
        assert!(result.is_err());

        let fields = fields.into_fields();
        assert_eq!(fields.len(), 2);
        let body = &fields[1];
        assert_eq!(body.name, "Body");
        assert_eq!(body.start, 1);
        assert_eq!(body.length, 4);
        assert_eq!(body.children.len(), 2);
        assert_eq!(body.find("Second").map(|field| field.start), Some(3));
    }

    #[test]
    fn test_window_bounds_reads() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let mut reader = Reader::new(&bytes);
        let mut fields = FieldReader::new(&mut reader);

        let result: Result<u16, ReadError> = fields.window("Inner", 1, |fields| fields.u16("Value"));
        assert!(result.is_err());
        assert_eq!(fields.left(), 4);
        assert_eq!(fields.u32("Value").unwrap(), 0x01020304);
    }

    #[test]
    fn test_failed_read_records_nothing() {
        let bytes = [0x01];
        let mut reader = Reader::new(&bytes);
        let mut fields = FieldReader::new(&mut reader);
        assert!(fields.u32("Sequence").is_err());
        assert!(fields.fields().is_empty());
    }
}
