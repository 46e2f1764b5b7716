//! NDR pointer types
//!
//! NDR supports three pointer semantics:
//!
//! - Reference (`[ref]`): non-null, no wire representation at top level
//! - Unique (`[unique]`): nullable, word-sized referent id, never aliased
//! - Full (`[ptr]`): nullable, word-sized referent id, aliasing allowed
//!
//! Unique and full pointees are written after the inline part of the
//! enclosing value, in the order their referent ids were assigned. Both are
//! backed by a [`Pointee`], a shared set-once slot: the decoder hands the
//! slot out as soon as it reads the referent id and fills it during the
//! deferred pass, and aliased full pointers decode to the same slot.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use crate::{NdrContext, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

/// Shared target of a unique or full pointer
pub struct Pointee<T>(Arc<OnceLock<T>>);

impl<T> Pointee<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(OnceLock::from(value)))
    }

    /// A slot to be filled by the deferred pass
    pub(crate) fn pending() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    pub(crate) fn fill(&self, value: T, referent_id: u64) -> Result<()> {
        self.0.set(value).map_err(|_| NdrError::InvalidPointer {
            referent_id,
            reason: "referent decoded twice",
        })
    }

    /// The target, or `None` while a decode has not yet reached it
    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }

    /// Mutable access, only while no alias shares the target
    pub fn get_mut(&mut self) -> Option<&mut T> {
        Arc::get_mut(&mut self.0).and_then(OnceLock::get_mut)
    }

    pub fn is_resolved(&self) -> bool {
        self.0.get().is_some()
    }

    /// Whether both handles refer to the same target
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address-derived identity used to detect aliasing on encode
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Take the target out if this is the only handle to it.
    pub fn try_unwrap(self) -> std::result::Result<T, Self> {
        match Arc::try_unwrap(self.0) {
            Ok(cell) => cell.into_inner().ok_or_else(Self::pending),
            Err(shared) => Err(Self(shared)),
        }
    }
}

impl<T> Clone for Pointee<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Default> Default for Pointee<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Pointee<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: PartialEq> PartialEq for Pointee<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.get() == other.get()
    }
}

impl<T: Eq> Eq for Pointee<T> {}

impl<T: fmt::Debug> fmt::Debug for Pointee<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("<pending>"),
        }
    }
}

/// How a pointer field is represented on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Fresh referent id per pointer
    Unique,
    /// Referent id shared by every pointer to the same target
    Full,
}

/// Trait for NDR pointer types
pub trait NdrPtr {
    type Target;

    fn is_null(&self) -> bool;

    fn get(&self) -> Option<&Self::Target>;

    fn get_mut(&mut self) -> Option<&mut Self::Target>;
}

impl NdrWriter {
    /// Write a unique or full pointer: the referent id now, the target in
    /// the deferred pass.
    ///
    /// A full pointer whose target was already queued writes the existing id
    /// and queues nothing.
    pub fn write_pointer<T>(&mut self, kind: PointerKind, target: Option<&Pointee<T>>) -> Result<()>
    where
        T: NdrEncode + Default + 'static,
    {
        let Some(target) = target else {
            return self.write_referent_id(0);
        };
        let (referent_id, fresh) = match kind {
            PointerKind::Unique => (self.tracker_mut().allocate(), true),
            PointerKind::Full => self.tracker_mut().resolve(target),
        };
        self.write_referent_id(referent_id)?;
        if fresh {
            let target = target.clone();
            self.defer(referent_id, move |w| match target.get() {
                Some(value) => value.ndr_encode(w),
                None => T::default().ndr_encode(w),
            });
        }
        Ok(())
    }

    pub fn write_unique<T>(&mut self, target: Option<&Pointee<T>>) -> Result<()>
    where
        T: NdrEncode + Default + 'static,
    {
        self.write_pointer(PointerKind::Unique, target)
    }

    pub fn write_full<T>(&mut self, target: Option<&Pointee<T>>) -> Result<()>
    where
        T: NdrEncode + Default + 'static,
    {
        self.write_pointer(PointerKind::Full, target)
    }

    /// Reference pointer target, inline. A missing target encodes the
    /// default value of its type.
    pub fn write_ref<T: NdrEncode + Default>(&mut self, target: Option<&T>) -> Result<()> {
        match target {
            Some(value) => value.ndr_encode(self),
            None => T::default().ndr_encode(self),
        }
    }
}

impl NdrReader {
    /// Read a referent id and bind it to a target.
    ///
    /// Returns `None` for the null id. A full pointer id seen earlier in
    /// this operation yields the already bound target; anything else gets a
    /// placeholder that the deferred pass fills.
    pub fn read_pointer<T>(&mut self, kind: PointerKind) -> Result<Option<Pointee<T>>>
    where
        T: NdrDecode + 'static,
    {
        let referent_id = self.read_referent_id()?;
        if referent_id == 0 {
            return Ok(None);
        }
        if kind == PointerKind::Full {
            if let Some(existing) = self.referents().lookup::<T>(referent_id)? {
                return Ok(Some(existing));
            }
        }

        let target = Pointee::pending();
        let slot = target.clone();
        self.defer(referent_id, move |r| {
            let value = T::ndr_decode(r)?;
            slot.fill(value, referent_id)
        });
        if kind == PointerKind::Full {
            self.referents().insert(referent_id, target.clone());
        }
        Ok(Some(target))
    }

    pub fn read_unique<T: NdrDecode + 'static>(&mut self) -> Result<Option<Pointee<T>>> {
        self.read_pointer(PointerKind::Unique)
    }

    pub fn read_full<T: NdrDecode + 'static>(&mut self) -> Result<Option<Pointee<T>>> {
        self.read_pointer(PointerKind::Full)
    }
}

/// Reference pointer - non-null, data follows inline
///
/// The `[ref]` attribute. The pointer itself is not transmitted; the
/// pointee data is always present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefPtr<T>(pub T);

impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> NdrPtr for RefPtr<T> {
    type Target = T;

    fn is_null(&self) -> bool {
        false
    }

    fn get(&self) -> Option<&T> {
        Some(&self.0)
    }

    fn get_mut(&mut self) -> Option<&mut T> {
        Some(&mut self.0)
    }
}

impl<T: NdrEncode> NdrEncode for RefPtr<T> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        self.0.ndr_encode(w)
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        T::ndr_align(ctx)
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        self.0.ndr_prepare()
    }

    fn ndr_validate(&self) -> Result<()> {
        self.0.ndr_validate()
    }
}

impl<T: NdrDecode> NdrDecode for RefPtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(Self(T::ndr_decode(r)?))
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        T::ndr_min_size(ctx)
    }
}

macro_rules! nullable_pointer {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(PartialEq, Eq)]
        pub struct $name<T>(pub Option<Pointee<T>>);

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self(self.0.clone())
            }
        }

        impl<T> $name<T> {
            pub fn new(value: T) -> Self {
                Self(Some(Pointee::new(value)))
            }

            pub fn null() -> Self {
                Self(None)
            }

            pub fn from_option(opt: Option<T>) -> Self {
                Self(opt.map(Pointee::new))
            }

            pub fn as_ref(&self) -> Option<&T> {
                self.0.as_ref().and_then(Pointee::get)
            }

            pub fn pointee(&self) -> Option<&Pointee<T>> {
                self.0.as_ref()
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::null()
            }
        }

        impl<T> From<Option<T>> for $name<T> {
            fn from(opt: Option<T>) -> Self {
                Self::from_option(opt)
            }
        }

        impl<T: fmt::Debug> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.0 {
                    Some(target) => f.debug_tuple(stringify!($name)).field(target).finish(),
                    None => write!(f, "{}(null)", stringify!($name)),
                }
            }
        }

        impl<T> NdrPtr for $name<T> {
            type Target = T;

            fn is_null(&self) -> bool {
                self.0.is_none()
            }

            fn get(&self) -> Option<&T> {
                self.as_ref()
            }

            fn get_mut(&mut self) -> Option<&mut T> {
                self.0.as_mut().and_then(Pointee::get_mut)
            }
        }

        impl<T: NdrEncode + Default + 'static> NdrEncode for $name<T> {
            fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
                w.write_pointer($kind, self.0.as_ref())
            }

            fn ndr_align(ctx: &NdrContext) -> usize {
                ctx.word_size()
            }

            /// A target shared with another pointer cannot be reconciled in
            /// place and is validated instead.
            fn ndr_prepare(&mut self) -> Result<()> {
                let Some(target) = self.0.as_mut() else {
                    return Ok(());
                };
                match target.get_mut() {
                    Some(value) => value.ndr_prepare(),
                    None => target.get().map_or(Ok(()), NdrEncode::ndr_validate),
                }
            }

            fn ndr_validate(&self) -> Result<()> {
                self.as_ref().map_or(Ok(()), NdrEncode::ndr_validate)
            }
        }

        impl<T: NdrDecode + 'static> NdrDecode for $name<T> {
            fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
                Ok(Self(r.read_pointer($kind)?))
            }

            fn ndr_min_size(ctx: &NdrContext) -> usize {
                ctx.word_size()
            }
        }
    };
}

nullable_pointer!(
    /// Unique pointer - nullable, no aliasing
    ///
    /// The `[unique]` attribute. Every non-null pointer gets its own
    /// referent id and its own copy of the pointee on the wire.
    UniquePtr,
    PointerKind::Unique
);

nullable_pointer!(
    /// Full pointer - nullable, aliasing allowed
    ///
    /// The `[ptr]` attribute. Clones made with [`FullPtr::alias`] share one
    /// target; the target is written once and every alias carries its
    /// referent id. Decoding yields aliases sharing one decoded target.
    FullPtr,
    PointerKind::Full
);

impl<T> FullPtr<T> {
    /// Another pointer to the same target
    pub fn alias(&self) -> Self {
        self.clone()
    }

    /// Whether both pointers are non-null and share one target
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
