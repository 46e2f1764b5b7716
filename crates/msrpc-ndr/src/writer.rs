//! NDR stub data writer
//!
//! The writer owns the output buffer, the referent tracker and the deferred
//! queue of pointees for one encode operation. Structure encoders call the
//! `write_*` methods in field order; pointer, array, string and union
//! methods live next to their types in the respective modules.

use std::collections::VecDeque;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::referent::ReferentTracker;
use crate::{NdrContext, NdrEncode, NdrError, Result, TransferSyntax};

type DeferredEncode = Box<dyn FnOnce(&mut NdrWriter) -> Result<()>>;

struct DeferredWrite {
    referent_id: u64,
    encode: DeferredEncode,
}

macro_rules! write_primitive {
    ($name:ident, $ty:ty, $size:expr, $put:ident) => {
        #[inline]
        pub fn $name(&mut self, value: $ty) {
            self.align($size);
            self.ctx.$put(&mut self.buf, value);
        }
    };
}

/// NDR encoder for one operation
pub struct NdrWriter {
    ctx: NdrContext,
    buf: BytesMut,
    tracker: ReferentTracker,
    deferred: VecDeque<DeferredWrite>,
}

impl NdrWriter {
    pub fn new(ctx: NdrContext) -> Self {
        Self::with_capacity(ctx, 256)
    }

    pub fn with_capacity(ctx: NdrContext, capacity: usize) -> Self {
        Self {
            ctx,
            buf: BytesMut::with_capacity(capacity),
            tracker: ReferentTracker::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Byte offset from the start of the stub data
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn tracker(&self) -> &ReferentTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ReferentTracker {
        &mut self.tracker
    }

    /// Pointees queued but not yet written
    pub fn pending_referents(&self) -> usize {
        self.deferred.len()
    }

    /// Pad with zero bytes up to the next multiple of `boundary`.
    pub fn align(&mut self, boundary: usize) {
        debug_assert!(matches!(boundary, 1 | 2 | 4 | 8), "bad NDR alignment {boundary}");
        let padding = NdrContext::align_padding(self.buf.len(), boundary);
        self.buf.put_bytes(0, padding);
    }

    /// Align to the referent id / size header width of the transfer syntax.
    pub fn align_word(&mut self) {
        self.align(self.ctx.word_size());
    }

    /// Pad a structure's tail to its alignment. NDR 2.0 has no trailing gaps.
    pub fn write_trailing_gap(&mut self, boundary: usize) {
        if self.ctx.syntax == TransferSyntax::Ndr64 {
            self.align(boundary);
        }
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    /// NDR boolean: one byte, 0x00 or 0x01
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    write_primitive!(write_u16, u16, 2, put_u16);
    write_primitive!(write_i16, i16, 2, put_i16);
    write_primitive!(write_u32, u32, 4, put_u32);
    write_primitive!(write_i32, i32, 4, put_i32);
    write_primitive!(write_u64, u64, 8, put_u64);
    write_primitive!(write_i64, i64, 8, put_i64);
    write_primitive!(write_f32, f32, 4, put_f32);
    write_primitive!(write_f64, f64, 8, put_f64);

    /// Raw bytes, no alignment
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a word-sized value: 4 bytes under NDR 2.0, 8 under NDR64.
    pub(crate) fn write_word(&mut self, field: &'static str, value: u64) -> Result<()> {
        self.align_word();
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => {
                let narrow = u32::try_from(value).map_err(|_| NdrError::InvalidLength {
                    field,
                    value,
                    max: u32::MAX as u64,
                })?;
                self.ctx.put_u32(&mut self.buf, narrow);
            }
            TransferSyntax::Ndr64 => self.ctx.put_u64(&mut self.buf, value),
        }
        Ok(())
    }

    /// `__int3264` unsigned: 4 bytes under NDR 2.0, 8 under NDR64
    pub fn write_uint3264(&mut self, value: u64) -> Result<()> {
        self.write_word("uint3264", value)
    }

    /// `__int3264` signed: 4 bytes under NDR 2.0, 8 under NDR64
    pub fn write_int3264(&mut self, value: i64) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => {
                let narrow = i32::try_from(value).map_err(|_| NdrError::InvalidLength {
                    field: "int3264",
                    value: value.unsigned_abs(),
                    max: i32::MAX as u64,
                })?;
                self.write_i32(narrow);
            }
            TransferSyntax::Ndr64 => self.write_i64(value),
        }
        Ok(())
    }

    /// Conformance / variance header
    pub fn write_size(&mut self, size: u64) -> Result<()> {
        self.write_word("size", size)
    }

    /// One size header per dimension of a multi-dimensional conformant array
    pub fn write_sizes(&mut self, sizes: &[u64]) -> Result<()> {
        for &size in sizes {
            self.write_size(size)?;
        }
        Ok(())
    }

    /// Inline referent id; 0 is the null pointer
    pub fn write_referent_id(&mut self, referent_id: u64) -> Result<()> {
        self.write_word("referent_id", referent_id)
    }

    /// NDR enum: 16 bits under NDR 2.0, 32 bits under NDR64
    pub fn write_enum(&mut self, value: u32) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => {
                let narrow = u16::try_from(value).map_err(|_| NdrError::InvalidEnumValue(value))?;
                self.write_u16(narrow);
            }
            TransferSyntax::Ndr64 => self.write_u32(value),
        }
        Ok(())
    }

    /// Encode a value at the current position
    pub fn write<T: NdrEncode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.ndr_encode(self)
    }

    /// Queue a pointee to be written in the deferred pass.
    pub(crate) fn defer<F>(&mut self, referent_id: u64, encode: F)
    where
        F: FnOnce(&mut NdrWriter) -> Result<()> + 'static,
    {
        self.deferred.push_back(DeferredWrite {
            referent_id,
            encode: Box::new(encode),
        });
    }

    /// Write all queued pointees in referent order.
    ///
    /// Pointees may queue further pointees; those are appended to the same
    /// queue and written by this loop.
    pub fn write_deferred(&mut self) -> Result<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }
        trace!("Flushing {} deferred referents at offset {}", self.deferred.len(), self.position());
        while let Some(entry) = self.deferred.pop_front() {
            (entry.encode)(self)?;
            self.tracker.mark_flushed(entry.referent_id);
        }
        Ok(())
    }

    /// Flush deferred pointees and return the stub data.
    pub fn finish(mut self) -> Result<Bytes> {
        self.write_deferred()?;
        trace!(
            "NDR encode complete: {} bytes, {} referents",
            self.buf.len(),
            self.tracker.len()
        );
        Ok(self.buf.freeze())
    }
}

impl fmt::Debug for NdrWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdrWriter")
            .field("ctx", &self.ctx)
            .field("position", &self.buf.len())
            .field("referents", &self.tracker.len())
            .field("pending", &self.deferred.len())
            .finish()
    }
}
