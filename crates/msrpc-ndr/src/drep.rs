//! Data Representation Format Label
//!
//! The 4-byte label carried in every connection-oriented PDU header tells
//! the receiver how the stub data was encoded. Only the integer
//! representation affects this codec.

/// Integer representation (upper nibble of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntRep {
    BigEndian = 0,
    #[default]
    LittleEndian = 1,
}

/// Character representation (lower nibble of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharRep {
    #[default]
    Ascii = 0,
    Ebcdic = 1,
}

/// Floating point representation (byte 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatRep {
    #[default]
    Ieee = 0,
    Vax = 1,
    Cray = 2,
    Ibm = 3,
}

/// Data representation label: little-endian, ASCII, IEEE by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRepresentation {
    pub int_rep: IntRep,
    pub char_rep: CharRep,
    pub float_rep: FloatRep,
}

impl DataRepresentation {
    pub fn with_int_rep(int_rep: IntRep) -> Self {
        Self {
            int_rep,
            ..Self::default()
        }
    }

    /// Parse a label. Any nonzero integer nibble reads as little-endian;
    /// bytes 2 and 3 are reserved.
    pub fn from_label(label: [u8; 4]) -> Self {
        let int_rep = match label[0] >> 4 {
            0 => IntRep::BigEndian,
            _ => IntRep::LittleEndian,
        };
        let char_rep = match label[0] & 0x0F {
            0 => CharRep::Ascii,
            _ => CharRep::Ebcdic,
        };
        let float_rep = match label[1] {
            0 => FloatRep::Ieee,
            1 => FloatRep::Vax,
            2 => FloatRep::Cray,
            _ => FloatRep::Ibm,
        };
        Self {
            int_rep,
            char_rep,
            float_rep,
        }
    }

    pub fn label(&self) -> [u8; 4] {
        [
            ((self.int_rep as u8) << 4) | self.char_rep as u8,
            self.float_rep as u8,
            0,
            0,
        ]
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self.int_rep, IntRep::LittleEndian)
    }
}
