//! NDR stub data reader
//!
//! Mirror of [`NdrWriter`](crate::NdrWriter): reads inline fields in schema
//! order, binds pointer fields to placeholders, and fills the placeholders
//! when the deferred queue is drained.

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, Bytes};
use tracing::trace;

use crate::error::Stage;
use crate::referent::ReferentTable;
use crate::{NdrContext, NdrDecode, NdrError, Result, TransferSyntax};

type DeferredDecode = Box<dyn FnOnce(&mut NdrReader) -> Result<()>>;

struct DeferredRead {
    referent_id: u64,
    decode: DeferredDecode,
}

macro_rules! read_primitive {
    ($name:ident, $ty:ty, $size:expr, $get:ident) => {
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            self.align($size);
            self.ensure(Stage::Primitive, $size)?;
            Ok(self.ctx.$get(&mut self.buf))
        }
    };
}

/// NDR decoder for one operation
pub struct NdrReader {
    ctx: NdrContext,
    buf: Bytes,
    total: usize,
    referents: ReferentTable,
    deferred: VecDeque<DeferredRead>,
}

impl NdrReader {
    pub fn new(data: impl Into<Bytes>, ctx: NdrContext) -> Self {
        let buf = data.into();
        let total = buf.len();
        Self {
            ctx,
            buf,
            total,
            referents: ReferentTable::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Byte offset from the start of the stub data
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub(crate) fn referents(&mut self) -> &mut ReferentTable {
        &mut self.referents
    }

    /// Pointees bound but not yet decoded
    pub fn pending_referents(&self) -> usize {
        self.deferred.len()
    }

    /// Skip pad bytes up to the next multiple of `boundary`.
    ///
    /// Pad values are ignored. A short buffer is left for the next read to
    /// report.
    pub fn align(&mut self, boundary: usize) {
        debug_assert!(matches!(boundary, 1 | 2 | 4 | 8), "bad NDR alignment {boundary}");
        let padding = NdrContext::align_padding(self.position(), boundary);
        let skip = padding.min(self.buf.remaining());
        self.buf.advance(skip);
    }

    pub fn align_word(&mut self) {
        self.align(self.ctx.word_size());
    }

    pub fn read_trailing_gap(&mut self, boundary: usize) {
        if self.ctx.syntax == TransferSyntax::Ndr64 {
            self.align(boundary);
        }
    }

    fn ensure(&self, stage: Stage, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(NdrError::UnexpectedEof {
                stage,
                needed,
                have: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Check that `count` elements of at least `element_size` bytes each can
    /// still be present in the buffer. Called before allocating for them.
    pub fn ensure_fits(&self, stage: Stage, count: u64, element_size: usize) -> Result<()> {
        let needed = count.saturating_mul(element_size as u64);
        if needed > self.buf.remaining() as u64 {
            return Err(NdrError::BufferOverflow {
                stage,
                needed,
                have: self.buf.remaining(),
            });
        }
        if count > self.ctx.max_array_elements as u64 {
            return Err(NdrError::AllocationLimitExceeded {
                requested: count,
                limit: self.ctx.max_array_elements,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(Stage::Primitive, 1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(Stage::Primitive, 1)?;
        Ok(self.buf.get_i8())
    }

    /// Any nonzero byte reads as `true`
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_primitive!(read_u16, u16, 2, get_u16);
    read_primitive!(read_i16, i16, 2, get_i16);
    read_primitive!(read_u32, u32, 4, get_u32);
    read_primitive!(read_i32, i32, 4, get_i32);
    read_primitive!(read_u64, u64, 8, get_u64);
    read_primitive!(read_i64, i64, 8, get_i64);
    read_primitive!(read_f32, f32, 4, get_f32);
    read_primitive!(read_f64, f64, 8, get_f64);

    /// Raw bytes, no alignment
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(Stage::Primitive, len)?;
        Ok(self.buf.split_to(len))
    }

    pub(crate) fn read_word(&mut self, stage: Stage) -> Result<u64> {
        self.align_word();
        let width = self.ctx.word_size();
        self.ensure(stage, width)?;
        Ok(match self.ctx.syntax {
            TransferSyntax::Ndr20 => u64::from(self.ctx.get_u32(&mut self.buf)),
            TransferSyntax::Ndr64 => self.ctx.get_u64(&mut self.buf),
        })
    }

    /// `__int3264` unsigned, zero-extended under NDR 2.0
    pub fn read_uint3264(&mut self) -> Result<u64> {
        self.read_word(Stage::Primitive)
    }

    /// `__int3264` signed, sign-extended under NDR 2.0
    pub fn read_int3264(&mut self) -> Result<i64> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => self.read_i32().map(i64::from),
            TransferSyntax::Ndr64 => self.read_i64(),
        }
    }

    /// Conformance / variance header
    pub fn read_size(&mut self) -> Result<u64> {
        self.read_word(Stage::Array)
    }

    pub fn read_sizes(&mut self, dimensions: usize) -> Result<Vec<u64>> {
        (0..dimensions).map(|_| self.read_size()).collect()
    }

    pub fn read_referent_id(&mut self) -> Result<u64> {
        self.read_word(Stage::Pointer)
    }

    pub fn read_enum(&mut self) -> Result<u32> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => Ok(u32::from(self.read_u16()?)),
            TransferSyntax::Ndr64 => self.read_u32(),
        }
    }

    /// Decode a value at the current position
    pub fn read<T: NdrDecode>(&mut self) -> Result<T> {
        T::ndr_decode(self)
    }

    pub(crate) fn defer<F>(&mut self, referent_id: u64, decode: F)
    where
        F: FnOnce(&mut NdrReader) -> Result<()> + 'static,
    {
        self.deferred.push_back(DeferredRead {
            referent_id,
            decode: Box::new(decode),
        });
    }

    /// Decode all bound pointees in referent order.
    pub fn read_deferred(&mut self) -> Result<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }
        trace!("Resolving {} deferred referents at offset {}", self.deferred.len(), self.position());
        while let Some(entry) = self.deferred.pop_front() {
            trace!("Decoding referent {:#x}", entry.referent_id);
            (entry.decode)(self)?;
        }
        Ok(())
    }

    /// Drain the deferred queue and end the operation.
    ///
    /// Returns the number of bytes left unread.
    pub fn finish(mut self) -> Result<usize> {
        self.read_deferred()?;
        let left = self.buf.remaining();
        if left > 0 {
            trace!("NDR decode left {} trailing bytes", left);
        }
        trace!("NDR decode complete: {} bytes consumed", self.position());
        Ok(left)
    }
}

impl fmt::Debug for NdrReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdrReader")
            .field("ctx", &self.ctx)
            .field("position", &self.position())
            .field("remaining", &self.buf.remaining())
            .field("referents", &self.referents.len())
            .field("pending", &self.deferred.len())
            .finish()
    }
}
