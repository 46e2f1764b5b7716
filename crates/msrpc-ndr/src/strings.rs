//! NDR string types
//!
//! NDR strings are conformant varying arrays with a null terminator.
//!
//! Wire format:
//! ```text
//! max_count: word    # Maximum elements including null
//! offset: word       # Always 0
//! actual_count: word # Actual elements including null
//! chars[actual_count]
//! ```
//!
//! Nothing is padded after the characters; the next field aligns itself.

use std::fmt;

use crate::error::Stage;
use crate::{NdrContext, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

impl NdrWriter {
    fn write_string_header(&mut self, count: usize) -> Result<()> {
        let count = count as u64;
        self.write_size(count)?;
        self.write_size(0)?;
        self.write_size(count)
    }

    fn write_utf16(&mut self, s: &str, terminated: bool) -> Result<()> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.write_string_header(units.len() + usize::from(terminated))?;
        for unit in units {
            self.write_u16(unit);
        }
        if terminated {
            self.write_u16(0);
        }
        Ok(())
    }

    fn write_8bit(&mut self, s: &str, terminated: bool) -> Result<()> {
        let bytes = s.as_bytes();
        self.write_string_header(bytes.len() + usize::from(terminated))?;
        self.write_bytes(bytes);
        if terminated {
            self.write_u8(0);
        }
        Ok(())
    }

    /// Null-terminated UTF-16 string (`[string] wchar_t*`)
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_utf16(s, true)
    }

    /// Null-terminated 8-bit string (`[string] char*`)
    pub fn write_cstring(&mut self, s: &str) -> Result<()> {
        self.write_8bit(s, true)
    }

    /// Counted UTF-16 string without terminator
    /// (`[size_is(n), length_is(n)] wchar_t*`)
    pub fn write_counted_string(&mut self, s: &str) -> Result<()> {
        self.write_utf16(s, false)
    }

    /// Counted 8-bit string without terminator
    pub fn write_counted_cstring(&mut self, s: &str) -> Result<()> {
        self.write_8bit(s, false)
    }
}

impl NdrReader {
    /// Read and validate the three string headers, returning the actual
    /// count once the buffer is known to hold that many units.
    fn read_string_header(&mut self, unit_size: usize) -> Result<u64> {
        let max_count = self.read_size()?;
        let offset = self.read_size()?;
        let actual_count = self.read_size()?;

        if offset != 0 || actual_count > max_count {
            return Err(NdrError::LengthMismatch {
                stage: Stage::String,
                max_count,
                offset,
                actual_count,
            });
        }
        self.ensure_fits(Stage::String, actual_count, unit_size)?;
        Ok(actual_count)
    }

    fn read_utf16(&mut self, terminated: bool) -> Result<String> {
        let count = self.read_string_header(2)?;
        let mut units = Vec::with_capacity(count as usize);
        for _ in 0..count {
            units.push(self.read_u16()?);
        }
        if terminated && units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units).map_err(|e| NdrError::InvalidString(e.to_string()))
    }

    fn read_8bit(&mut self, terminated: bool) -> Result<String> {
        let count = self.read_string_header(1)?;
        let mut bytes = self.read_bytes(count as usize)?.to_vec();
        if terminated && bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|e| NdrError::InvalidString(e.to_string()))
    }

    /// Null-terminated UTF-16 string. The terminator is dropped.
    pub fn read_string(&mut self) -> Result<String> {
        self.read_utf16(true)
    }

    /// Null-terminated 8-bit string. The terminator is dropped.
    pub fn read_cstring(&mut self) -> Result<String> {
        self.read_8bit(true)
    }

    /// Counted UTF-16 string; every transmitted unit is kept.
    pub fn read_counted_string(&mut self) -> Result<String> {
        self.read_utf16(false)
    }

    pub fn read_counted_cstring(&mut self) -> Result<String> {
        self.read_8bit(false)
    }
}

macro_rules! ndr_string_type {
    ($(#[$doc:meta])* $name:ident, $write:ident, $read:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl NdrEncode for $name {
            fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
                w.$write(&self.0)
            }

            fn ndr_align(ctx: &NdrContext) -> usize {
                ctx.word_size()
            }
        }

        impl NdrDecode for $name {
            fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
                r.$read().map(Self)
            }

            fn ndr_min_size(ctx: &NdrContext) -> usize {
                3 * ctx.word_size()
            }
        }
    };
}

ndr_string_type!(
    /// ANSI string type (null-terminated char*)
    ///
    /// Used for [string] annotated char* parameters in MIDL.
    NdrString,
    write_cstring,
    read_cstring
);

ndr_string_type!(
    /// Unicode string type (null-terminated wchar_t*)
    ///
    /// Used for [string] annotated wchar_t* parameters in MIDL.
    /// Encoded as UTF-16 in the context's byte order.
    NdrWString,
    write_string,
    read_string
);
