//! Text encodings games read.

/// UTF-8 byte order mark.
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Encoding of an exported text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// UTF-8 with a leading byte order mark. Required for localisation files.
    Utf8Bom,
}

impl TextEncoding {
    /// Bytes written before the text.
    pub fn preamble(self) -> &'static [u8] {
        match self {
            Self::Utf8 => &[],
            Self::Utf8Bom => UTF8_BOM,
        }
    }

    /// Encode `text`. Empty text encodes to zero bytes for every encoding.
    pub fn encode(self, text: &str) -> Vec<u8> {
        if text.is_empty() {
            return Vec::new();
        }
        let preamble = self.preamble();
        let mut bytes = Vec::with_capacity(preamble.len() + text.len());
        bytes.extend_from_slice(preamble);
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_has_no_preamble() {
        assert_eq!(TextEncoding::Utf8.encode("a = b\n"), b"a = b\n");
    }

    #[test]
    fn test_utf8_bom_prefix() {
        let bytes = TextEncoding::Utf8Bom.encode("l_english:\n");
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], b"l_english:\n");
    }

    #[test]
    fn test_empty_text_is_zero_bytes() {
        assert!(TextEncoding::Utf8.encode("").is_empty());
        assert!(TextEncoding::Utf8Bom.encode("").is_empty());
    }
}
