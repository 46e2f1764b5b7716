//! NDR encoding trait and entry points

use bytes::Bytes;

use crate::{NdrContext, NdrWriter, Result};

/// Trait for types that can be encoded to NDR format
pub trait NdrEncode {
    /// Write this value at the writer's current position.
    ///
    /// Embedded pointers write their referent id here and queue the pointee
    /// on the writer; the pointee is written when the deferred queue is
    /// drained.
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()>;

    /// NDR alignment of this type: its widest primitive, transitively.
    fn ndr_align(_ctx: &NdrContext) -> usize
    where
        Self: Sized,
    {
        1
    }

    /// Reconcile derived fields (array counts) and run range checks.
    ///
    /// Runs before any byte is written; a failure leaves no partial output.
    fn ndr_prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Range checks without mutation.
    ///
    /// Runs in place of `ndr_prepare` for targets shared by several full
    /// pointers, which cannot be reconciled in place. Types whose prepare
    /// step range-checks must check the same bounds here, taking derived
    /// counts as `ndr_prepare` would compute them.
    fn ndr_validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Validation/normalization callback run after `ndr_prepare` and before
/// encoding.
pub trait PrepareHook<T: ?Sized> {
    fn after_prepare(&mut self, value: &mut T) -> Result<()>;
}

impl<T: ?Sized, F> PrepareHook<T> for F
where
    F: FnMut(&mut T) -> Result<()>,
{
    fn after_prepare(&mut self, value: &mut T) -> Result<()> {
        self(value)
    }
}

/// The no-op hook
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl<T: ?Sized> PrepareHook<T> for NoHook {
    fn after_prepare(&mut self, _value: &mut T) -> Result<()> {
        Ok(())
    }
}

/// Encode `value` and its pointees into a fresh buffer.
pub fn encode<T: NdrEncode + ?Sized>(value: &T, ctx: NdrContext) -> Result<Bytes> {
    let mut w = NdrWriter::new(ctx);
    value.ndr_encode(&mut w)?;
    w.finish()
}

/// Prepare `value`, run `hook`, then encode it.
pub fn encode_prepared<T, H>(value: &mut T, ctx: NdrContext, mut hook: H) -> Result<Bytes>
where
    T: NdrEncode,
    H: PrepareHook<T>,
{
    value.ndr_prepare()?;
    hook.after_prepare(value)?;
    encode(value, ctx)
}
