//! NDR encoding/decoding context
//!
//! The context carries the negotiated byte order and transfer syntax, and
//! provides helpers for alignment and primitive encoding/decoding.

use bytes::{Buf, BufMut};

use crate::drep::DataRepresentation;
use crate::error::MAX_NDR_ARRAY_ELEMENTS;

/// Transfer syntax the stub data is encoded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferSyntax {
    /// NDR 2.0 (`8a885d04-1ceb-11c9-9fe8-08002b104860`): 4-byte referent ids and size headers
    #[default]
    Ndr20,
    /// NDR64 (`71710533-beba-4937-8319-b5dbef9ccc36`): 8-byte referent ids and size headers
    Ndr64,
}

impl TransferSyntax {
    pub const NDR20_UUID: &'static str = "8a885d04-1ceb-11c9-9fe8-08002b104860";
    pub const NDR64_UUID: &'static str = "71710533-beba-4937-8319-b5dbef9ccc36";

    /// Width of referent ids, size headers and pointer alignment
    #[inline]
    pub fn word_size(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 4,
            TransferSyntax::Ndr64 => 8,
        }
    }

    /// Wire width of an `enum`
    #[inline]
    pub fn enum_size(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 2,
            TransferSyntax::Ndr64 => 4,
        }
    }
}

/// NDR encoding/decoding context
///
/// Tracks the byte order and transfer syntax and provides methods for
/// encoding/decoding primitives with proper alignment.
#[derive(Debug, Clone, Copy)]
pub struct NdrContext {
    /// Whether to use little-endian byte order
    pub little_endian: bool,
    /// Transfer syntax
    pub syntax: TransferSyntax,
    /// Upper bound on elements in one decoded array
    pub max_array_elements: usize,
}

impl NdrContext {
    /// Create a new NDR 2.0 context with little-endian byte order (default)
    pub fn new() -> Self {
        Self {
            little_endian: true,
            syntax: TransferSyntax::Ndr20,
            max_array_elements: MAX_NDR_ARRAY_ELEMENTS,
        }
    }

    /// Create a context with big-endian byte order
    pub fn big_endian() -> Self {
        Self::new().with_byte_order(false)
    }

    /// Create a little-endian NDR64 context
    pub fn ndr64() -> Self {
        Self::new().with_syntax(TransferSyntax::Ndr64)
    }

    /// Create a context from the data representation label of a PDU header
    pub fn from_data_representation(label: [u8; 4]) -> Self {
        let drep = DataRepresentation::from_label(label);
        Self::new().with_byte_order(drep.is_little_endian())
    }

    pub fn with_byte_order(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    pub fn with_syntax(mut self, syntax: TransferSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_max_array_elements(mut self, limit: usize) -> Self {
        self.max_array_elements = limit;
        self
    }

    /// Referent id / size header width
    #[inline]
    pub fn word_size(&self) -> usize {
        self.syntax.word_size()
    }

    /// Calculate padding needed to align to the given boundary
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        (alignment - position % alignment) % alignment
    }
}

macro_rules! byte_order_codec {
    ($($ty:ty => $put:ident / $put_le:ident, $get:ident / $get_le:ident;)*) => {
        impl NdrContext {
            $(
                #[inline]
                pub fn $put<B: BufMut>(&self, buf: &mut B, value: $ty) {
                    if self.little_endian {
                        buf.$put_le(value)
                    } else {
                        buf.$put(value)
                    }
                }

                /// Callers check `remaining()` first.
                #[inline]
                pub fn $get<B: Buf>(&self, buf: &mut B) -> $ty {
                    if self.little_endian {
                        buf.$get_le()
                    } else {
                        buf.$get()
                    }
                }
            )*
        }
    };
}

byte_order_codec! {
    u16 => put_u16 / put_u16_le, get_u16 / get_u16_le;
    i16 => put_i16 / put_i16_le, get_i16 / get_i16_le;
    u32 => put_u32 / put_u32_le, get_u32 / get_u32_le;
    i32 => put_i32 / put_i32_le, get_i32 / get_i32_le;
    u64 => put_u64 / put_u64_le, get_u64 / get_u64_le;
    i64 => put_i64 / put_i64_le, get_i64 / get_i64_le;
    f32 => put_f32 / put_f32_le, get_f32 / get_f32_le;
    f64 => put_f64 / put_f64_le, get_f64 / get_f64_le;
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
