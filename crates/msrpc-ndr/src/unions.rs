//! NDR discriminated unions
//!
//! A union is a discriminant of declared wire width followed by exactly one
//! arm, aligned to the union's arm alignment. The discriminant's width is a
//! property of the union declaration, not of the field the selector is
//! taken from.
//!
//! Encoding never fails on an arm/selector mismatch: an unrecognized
//! selector is replaced by the union's default selector, and an arm that
//! does not belong to the selector is replaced by that selector's
//! default-constructed arm. Decoding an unrecognized selector yields the
//! union's inert unknown variant unless the strict reader is used.

use tracing::debug;

use crate::{NdrContext, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

/// Wire width of a union discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchType {
    U8,
    U16,
    U32,
    /// `enum` switch: 16 bits under NDR 2.0, 32 bits under NDR64
    Enum,
}

impl SwitchType {
    pub fn size(self, ctx: &NdrContext) -> usize {
        match self {
            SwitchType::U8 => 1,
            SwitchType::U16 => 2,
            SwitchType::U32 => 4,
            SwitchType::Enum => ctx.syntax.enum_size(),
        }
    }
}

/// A discriminated union over a closed set of arms
pub trait NdrUnion: Sized {
    /// Discriminant width on the wire
    const SWITCH: SwitchType;

    /// Selector used when encoding with a selector the union does not know
    const DEFAULT_SELECTOR: u32;

    /// Selector that corresponds to the current arm
    fn selector(&self) -> u32;

    /// Whether `selector` names an arm of this union
    fn recognizes(selector: u32) -> bool;

    /// Whether this value may be written under `selector`
    fn accepts(&self, selector: u32) -> bool {
        self.selector() == selector
    }

    /// Default-constructed arm for a recognized selector
    fn default_arm(selector: u32) -> Self;

    /// Inert variant for a selector the union does not know
    fn unknown(selector: u32) -> Self;

    /// Write the arm payload, without the discriminant
    fn encode_arm(&self, w: &mut NdrWriter) -> Result<()>;

    /// Read the payload of the arm named by `selector`.
    ///
    /// Returns `UnknownVariant` for selectors without an arm.
    fn decode_arm(selector: u32, r: &mut NdrReader) -> Result<Self>;

    /// Alignment of the arm area: the widest arm's alignment
    fn arm_align(_ctx: &NdrContext) -> usize {
        1
    }
}

impl NdrWriter {
    /// Write a discriminant at the width of `switch`.
    ///
    /// A selector that does not fit is `InvalidEnumValue`; truncating it
    /// would name a different arm than the one written.
    pub fn write_switch(&mut self, switch: SwitchType, selector: u32) -> Result<()> {
        let too_wide = |_| NdrError::InvalidEnumValue(selector);
        match switch {
            SwitchType::U8 => self.write_u8(u8::try_from(selector).map_err(too_wide)?),
            SwitchType::U16 => self.write_u16(u16::try_from(selector).map_err(too_wide)?),
            SwitchType::U32 => self.write_u32(selector),
            SwitchType::Enum => self.write_enum(selector)?,
        }
        Ok(())
    }

    /// Write `value` as the union selected by `selector`.
    pub fn write_union<U: NdrUnion>(&mut self, selector: u32, value: &U) -> Result<()> {
        let selector = if U::recognizes(selector) {
            selector
        } else {
            debug!(
                "Union selector {} not recognized, using default {}",
                selector,
                U::DEFAULT_SELECTOR
            );
            U::DEFAULT_SELECTOR
        };

        self.write_switch(U::SWITCH, selector)?;
        self.align(U::arm_align(self.context()));

        if value.accepts(selector) {
            value.encode_arm(self)
        } else {
            debug!(
                "Union arm {} does not match selector {}, writing default arm",
                value.selector(),
                selector
            );
            U::default_arm(selector).encode_arm(self)
        }
    }
}

impl NdrReader {
    pub fn read_switch(&mut self, switch: SwitchType) -> Result<u32> {
        match switch {
            SwitchType::U8 => self.read_u8().map(u32::from),
            SwitchType::U16 => self.read_u16().map(u32::from),
            SwitchType::U32 => self.read_u32(),
            SwitchType::Enum => self.read_enum(),
        }
    }

    /// Read a union; an unrecognized selector yields `U::unknown`.
    pub fn read_union<U: NdrUnion>(&mut self) -> Result<U> {
        match self.read_union_strict() {
            Err(NdrError::UnknownVariant { selector }) => {
                debug!("Ignoring unknown union selector {}", selector);
                Ok(U::unknown(selector))
            }
            other => other,
        }
    }

    /// Read a union; an unrecognized selector is an `UnknownVariant` error.
    ///
    /// Only the discriminant has been consumed when the error is returned.
    pub fn read_union_strict<U: NdrUnion>(&mut self) -> Result<U> {
        let selector = self.read_switch(U::SWITCH)?;
        if !U::recognizes(selector) {
            return Err(NdrError::UnknownVariant { selector });
        }
        self.align(U::arm_align(self.context()));
        U::decode_arm(selector, self)
    }
}

/// Encapsulated union: a union whose selector comes from its own arm
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncapsulatedUnion<U>(pub U);

impl<U: NdrUnion> NdrEncode for EncapsulatedUnion<U> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        w.write_union(self.0.selector(), &self.0)
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        U::SWITCH.size(ctx).max(U::arm_align(ctx))
    }
}

impl<U: NdrUnion> NdrDecode for EncapsulatedUnion<U> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        r.read_union().map(Self)
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        U::SWITCH.size(ctx)
    }
}
