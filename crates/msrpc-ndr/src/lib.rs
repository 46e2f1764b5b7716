//! NDR (Network Data Representation) codec for generated MS-RPC bindings
//!
//! This crate implements the NDR wire format as defined by DCE RPC and
//! MS-RPCE, for both the NDR 2.0 and NDR64 transfer syntaxes. Generated
//! bindings implement [`NdrEncode`] and [`NdrDecode`] for their records and
//! call the writer/reader operations in schema field order.
//!
//! # NDR Wire Format
//!
//! NDR is the standard encoding for DCE RPC data. Key characteristics:
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes)
//! - Structures align to their largest member
//! - Embedded pointers are written inline as referent ids; their targets
//!   follow the inline data in the order the ids were assigned
//! - Conformant data (arrays with runtime-determined size) carries its
//!   counts in separate headers
//! - Strings are conformant varying arrays with null terminator
//!
//! # Example
//!
//! ```
//! use msrpc_ndr::{decode, encode, NdrContext, UniquePtr};
//!
//! let ctx = NdrContext::new();
//! let bytes = encode(&UniquePtr::new(7u32), ctx)?;
//! assert_eq!(&bytes[..], &[0x00, 0x00, 0x02, 0x00, 7, 0, 0, 0]);
//!
//! let value: UniquePtr<u32> = decode(bytes, ctx)?;
//! assert_eq!(value.as_ref(), Some(&7));
//! # Ok::<(), msrpc_ndr::NdrError>(())
//! ```

mod arrays;
mod chain;
mod context;
mod decode;
mod drep;
mod encode;
mod error;
mod pointers;
mod primitives;
mod reader;
mod referent;
mod strings;
mod unions;
mod writer;

pub use arrays::{
    reconcile_count, ArrayDescriptor, ConformantArray, ConformantVaryingArray, FixedArray,
    VaryingArray,
};
pub use chain::{ChainLink, PointerChain};
pub use context::{NdrContext, TransferSyntax};
pub use decode::{decode, NdrDecode};
pub use drep::{CharRep, DataRepresentation, FloatRep, IntRep};
pub use encode::{encode, encode_prepared, NdrEncode, NoHook, PrepareHook};
pub use error::{check_range, NdrError, Result, Stage, MAX_NDR_ARRAY_ELEMENTS};
pub use pointers::{FullPtr, NdrPtr, Pointee, PointerKind, RefPtr, UniquePtr};
pub use primitives::NdrUuid;
pub use reader::NdrReader;
pub use referent::{ReferentState, ReferentTracker, FIRST_REFERENT_ID, REFERENT_ID_STEP};
pub use strings::{NdrString, NdrWString};
pub use unions::{EncapsulatedUnion, NdrUnion, SwitchType};
pub use writer::NdrWriter;

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Initialize logging for unit tests
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
