use crate::error::ReadError;
use crate::reader::Reader;
use std::cell::OnceCell;

// RFC 1035, 4.1.4. Message compression
pub const LABEL_TYPE_MASK: u8 = 0b1100_0000;
pub const LABEL_TYPE_POINTER: u8 = 0b1100_0000;
pub const LABEL_TYPE_LITERAL: u8 = 0b0000_0000;

/// DNS name as found on the wire: the literal labels read in place, then an
/// optional pointer to the rest of the name earlier in the message.
///
/// The dotted form is built on first [`StringRef::resolve`] and memoized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringRef {
    pub labels: Vec<String>,
    pub pointer: Option<u16>,
    // Message offset of the first byte of this name.
    pub origin: usize,
    resolved: OnceCell<String>,
}

impl StringRef {
    /// Reads one name at the cursor. `reader` must address the DNS message
    /// itself, so offsets match compression pointers.
    ///
    /// Label types 0b01 and 0b10 can't be represented and end the name early.
    pub fn read(reader: &mut Reader) -> Result<Self, ReadError> {
        let mut name = Self {
            origin: reader.position(),
            ..Default::default()
        };

        loop {
            let control = reader.u8()?;
            match control & LABEL_TYPE_MASK {
                LABEL_TYPE_LITERAL if control == 0 => break,
                LABEL_TYPE_LITERAL => {
                    let label = reader.take(control as usize)?;
                    name.labels.push(String::from_utf8_lossy(label).into_owned());
                },
                LABEL_TYPE_POINTER => {
                    let low = reader.u8()?;
                    name.pointer = Some(u16::from_be_bytes([control & !LABEL_TYPE_MASK, low]));
                    break;
                },
                _ => break,
            }
        }

        Ok(name)
    }

    pub fn literal(&self) -> String {
        self.labels.join(".")
    }

    /// Dotted name with every pointer followed.
    ///
    /// A pointer is followed only when it targets bytes before this name, and
    /// the target is read from a window that ends at this name. Every hop
    /// therefore moves strictly backward, so a malformed chain ends instead of
    /// looping. What could not be followed is left out of the result.
    pub fn resolve(&self, message: &[u8]) -> &str {
        self.resolved.get_or_init(|| {
            let mut labels = self.labels.clone();

            let pointer = self
                .pointer
                .map(usize::from)
                .filter(|pointer| *pointer < self.origin);
            if let Some(pointer) = pointer {
                let window = message.get(..self.origin).unwrap_or_default();
                let mut reader = Reader::at(window, pointer);
                if let Ok(target) = StringRef::read(&mut reader) {
                    let suffix = target.resolve(message);
                    if !suffix.is_empty() {
                        labels.push(suffix.to_string());
                    }
                }
            }

            labels.join(".")
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Header-less message: "www.wide.ad.jp" at 0, then "endo" + pointer to "wide.ad.jp".
    const MESSAGE: &str = "03 77 77 77 04 77 69 64 65 02 61 64 02 6A 70 00 04 65 6E 64 6F C0 04";

    fn message() -> Vec<u8> {
        hex::decode(MESSAGE.replace(" ", "")).unwrap()
    }

    #[test]
    fn test_literal_name() {
        let bytes = message();
        let mut reader = Reader::new(&bytes);
        let name = StringRef::read(&mut reader).unwrap();

        assert_eq!(name.pointer, None);
        assert_eq!(name.origin, 0);
        assert_eq!(reader.position(), 16);
        assert_eq!(name.resolve(&bytes), "www.wide.ad.jp");
    }

    #[test]
    fn test_pointer_matches_manual_expansion() {
        let bytes = message();
        let mut reader = Reader::at(&bytes, 16);
        let name = StringRef::read(&mut reader).unwrap();

        assert_eq!(name.labels, vec!["endo".to_string()]);
        assert_eq!(name.pointer, Some(4));
        assert!(reader.is_empty());
        assert!(!name.is_resolved());

        let manual = "04 65 6E 64 6F 04 77 69 64 65 02 61 64 02 6A 70 00".replace(" ", "");
        let manual = hex::decode(manual).unwrap();
        let expanded = StringRef::read(&mut Reader::new(&manual)).unwrap();

        assert_eq!(name.resolve(&bytes), expanded.resolve(&manual));
        assert_eq!(name.resolve(&bytes), "endo.wide.ad.jp");
        assert!(name.is_resolved());
    }

    #[test]
    fn test_self_pointer_terminates() {
        // "a" + pointer to itself.
        let bytes = hex::decode("0161C000").unwrap();
        let name = StringRef::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(name.pointer, Some(0));
        assert_eq!(name.resolve(&bytes), "a");
    }

    #[test]
    fn test_pointer_loop_terminates() {
        // Two names pointing at each other: 0 -> 4, 4 -> 0.
        let bytes = hex::decode("0161C0040162C000").unwrap();
        let first = StringRef::read(&mut Reader::new(&bytes)).unwrap();
        let second = StringRef::read(&mut Reader::at(&bytes, 4)).unwrap();

        assert_eq!(first.resolve(&bytes), "a");
        assert_eq!(second.resolve(&bytes), "b.a");
    }

    #[test]
    fn test_unrepresentable_label_type() {
        let bytes = hex::decode("01614100").unwrap();
        let name = StringRef::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(name.literal(), "a");
        assert_eq!(name.pointer, None);
    }
}
