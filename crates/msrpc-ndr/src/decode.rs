//! NDR decoding trait and entry point

use bytes::Bytes;

use crate::{NdrContext, NdrReader, Result};

/// Trait for types that can be decoded from NDR format
pub trait NdrDecode: Sized {
    /// Read a value at the reader's current position.
    ///
    /// Embedded pointers bind to placeholders that are filled when the
    /// reader's deferred queue is drained.
    fn ndr_decode(r: &mut NdrReader) -> Result<Self>;

    /// Lower bound on the inline wire size of one value, used to reject
    /// array headers that claim more elements than the buffer can hold.
    fn ndr_min_size(_ctx: &NdrContext) -> usize {
        1
    }
}

/// Decode a `T` and all of its pointees from `data`.
pub fn decode<T: NdrDecode>(data: impl Into<Bytes>, ctx: NdrContext) -> Result<T> {
    let mut r = NdrReader::new(data, ctx);
    let value = T::ndr_decode(&mut r)?;
    r.finish()?;
    Ok(value)
}
