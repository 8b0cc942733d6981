//! Byte/text codec for the supported row and cell projections.
//!
//! Every projection is a pure function of the input. `Hex` is lossless for
//! all byte sequences; the text encodings round-trip only for bytes that
//! are valid under that encoding.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use encoding_rs::WINDOWS_1251;

use crate::{Error, Result};

/// A named byte<->text projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Two uppercase hex digits per byte.
    Hex,
    /// UTF-8; invalid sequences render as U+FFFD.
    Utf8,
    /// 7-bit ASCII; high bytes render as U+FFFD.
    Ascii,
    /// Windows-1251 Cyrillic code page.
    Cp1251,
}

impl Encoding {
    /// Every supported encoding, in index order.
    pub const ALL: [Encoding; 4] = [
        Encoding::Hex,
        Encoding::Utf8,
        Encoding::Ascii,
        Encoding::Cp1251,
    ];

    /// Number of supported encodings.
    pub const COUNT: usize = Self::ALL.len();

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Hex => "hex",
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
            Encoding::Cp1251 => "cp1251",
        }
    }

    /// Look up an encoding by name (case-insensitive, common aliases
    /// accepted).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(Encoding::Hex),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "cp1251" | "windows-1251" => Ok(Encoding::Cp1251),
            _ => Err(Error::UnsupportedEncoding(name.to_string())),
        }
    }

    /// Position of this encoding in [`Encoding::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Render bytes as text.
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Hex => hex::encode_upper(bytes),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
            Encoding::Cp1251 => WINDOWS_1251
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }

    /// Turn text back into bytes.
    pub fn decode(self, text: &str) -> Result<Bytes> {
        match self {
            Encoding::Hex => hex::decode(text)
                .map(Bytes::from)
                .map_err(|e| Error::invalid_input(self.name(), e.to_string())),
            Encoding::Utf8 => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Encoding::Ascii => match text.char_indices().find(|(_, c)| !c.is_ascii()) {
                Some((pos, c)) => Err(Error::invalid_input(
                    self.name(),
                    format!("character {:?} at byte {} is not ASCII", c, pos),
                )),
                None => Ok(Bytes::copy_from_slice(text.as_bytes())),
            },
            Encoding::Cp1251 => {
                let (encoded, _, unmappable) = WINDOWS_1251.encode(text);
                if unmappable {
                    return Err(Error::invalid_input(
                        self.name(),
                        "text contains characters outside the code page",
                    ));
                }
                Ok(Bytes::copy_from_slice(&encoded))
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Encoding::from_name(s)
    }
}

/// Render `bytes` under the encoding called `encoding`.
pub fn encode(bytes: &[u8], encoding: &str) -> Result<String> {
    Ok(Encoding::from_name(encoding)?.encode(bytes))
}

/// Parse `text` under the encoding called `encoding`.
pub fn decode(text: &str, encoding: &str) -> Result<Bytes> {
    Encoding::from_name(encoding)?.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_encode() {
        assert_eq!(Encoding::Hex.encode(&[0x01, 0xab, 0xff]), "01ABFF");
        assert_eq!(Encoding::Hex.encode(&[]), "");
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(
            Encoding::Hex.decode("01ABff").unwrap(),
            Bytes::from_static(&[0x01, 0xab, 0xff])
        );
    }

    #[test]
    fn test_hex_decode_rejects_bad_input() {
        assert!(matches!(
            Encoding::Hex.decode("0G"),
            Err(Error::InvalidEncodingInput { .. })
        ));
        assert!(matches!(
            Encoding::Hex.decode("ABC"),
            Err(Error::InvalidEncodingInput { .. })
        ));
    }

    #[test]
    fn test_utf8() {
        let bytes = "Привет".as_bytes();
        assert_eq!(Encoding::Utf8.encode(bytes), "Привет");
        assert_eq!(Encoding::Utf8.decode("Привет").unwrap().as_ref(), bytes);

        // Invalid sequences are replaced rather than rejected.
        assert_eq!(Encoding::Utf8.encode(&[0x41, 0xff]), "A\u{FFFD}");
    }

    #[test]
    fn test_ascii() {
        assert_eq!(Encoding::Ascii.encode(b"key:1"), "key:1");
        assert_eq!(Encoding::Ascii.encode(&[0x61, 0xe9]), "a\u{FFFD}");
        assert_eq!(Encoding::Ascii.decode("abc").unwrap().as_ref(), b"abc");
        assert!(matches!(
            Encoding::Ascii.decode("caf\u{e9}"),
            Err(Error::InvalidEncodingInput { .. })
        ));
    }

    #[test]
    fn test_cp1251() {
        // "Да" in Windows-1251
        let bytes = [0xc4, 0xe0];
        assert_eq!(Encoding::Cp1251.encode(&bytes), "Да");
        assert_eq!(Encoding::Cp1251.decode("Да").unwrap().as_ref(), &bytes);
        assert!(matches!(
            Encoding::Cp1251.decode("日本"),
            Err(Error::InvalidEncodingInput { .. })
        ));
    }

    #[test]
    fn test_names() {
        for encoding in Encoding::ALL {
            assert_eq!(Encoding::from_name(encoding.name()).unwrap(), encoding);
            assert_eq!(encoding.to_string().parse::<Encoding>().unwrap(), encoding);
        }
        assert_eq!(Encoding::from_name("UTF8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_name("windows-1251").unwrap(), Encoding::Cp1251);
        assert!(matches!(
            Encoding::from_name("ebcdic"),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_indices_match_all() {
        for (i, encoding) in Encoding::ALL.iter().enumerate() {
            assert_eq!(encoding.index(), i);
        }
    }

    #[test]
    fn test_by_name() {
        assert_eq!(encode(b"\x0a", "hex").unwrap(), "0A");
        assert_eq!(decode("0A", "HEX").unwrap().as_ref(), b"\x0a");
        assert!(matches!(
            encode(b"x", "latin9"),
            Err(Error::UnsupportedEncoding(_))
        ));
        assert!(matches!(
            decode("x", "latin9"),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let text = Encoding::Hex.encode(&bytes);
            prop_assert_eq!(text.len(), bytes.len() * 2);
            prop_assert!(text.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
            let decoded = Encoding::Hex.decode(&text).unwrap();
            prop_assert_eq!(decoded.as_ref(), &bytes[..]);
        }

        #[test]
        fn prop_utf8_round_trip(text in ".*") {
            let bytes = Encoding::Utf8.decode(&text).unwrap();
            prop_assert_eq!(Encoding::Utf8.encode(&bytes), text);
        }
    }
}
