//! NDR array types
//!
//! NDR supports several array types:
//!
//! - Fixed arrays: size known at compile time, no header
//! - Conformant arrays: maximum count transmitted as a prefix
//! - Varying arrays: offset and actual count transmitted as a prefix
//! - Conformant varying arrays: both
//!
//! The count a caller wants transmitted is kept apart from the length of the
//! live slice. Encoding writes the first `min(count, len, declared_max)` live
//! elements and pads with default values up to the declared count; surplus
//! live elements are dropped.

use tracing::trace;

use crate::error::Stage;
use crate::{NdrContext, NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

/// Count headers of one array field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayDescriptor {
    /// Elements the caller wants transmitted
    pub count: u32,
    /// Conformant dimension written inline
    pub declared_max: u32,
}

impl ArrayDescriptor {
    pub fn new(count: u32, declared_max: u32) -> Self {
        Self { count, declared_max }
    }

    /// Descriptor whose count and maximum agree
    pub fn sized(count: u32) -> Self {
        Self::new(count, count)
    }

    /// Descriptor covering all of `elements`
    pub fn for_slice<T>(elements: &[T]) -> Result<Self> {
        Ok(Self::sized(length_u32("count", elements.len())?))
    }

    /// Live elements that make it onto the wire
    pub fn live_count(&self, len: usize) -> usize {
        (self.count.min(self.declared_max) as usize).min(len)
    }
}

/// Derive an explicit count left at zero from the length of its slice.
pub fn reconcile_count(count: &mut u32, len: usize) -> Result<()> {
    if *count == 0 && len > 0 {
        *count = length_u32("count", len)?;
    }
    Ok(())
}

fn length_u32(field: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| NdrError::InvalidLength {
        field,
        value: len as u64,
        max: u64::from(u32::MAX),
    })
}

impl NdrWriter {
    /// Conformant array: maximum count header, then the elements.
    pub fn write_array<T: NdrEncode + Default>(
        &mut self,
        desc: ArrayDescriptor,
        elements: &[T],
    ) -> Result<()> {
        self.write_size(u64::from(desc.declared_max))?;
        self.write_array_elements(desc, elements)
    }

    /// Element body of a conformant array whose header was written earlier
    /// (a conformant array embedded at the end of a structure).
    pub fn write_array_elements<T: NdrEncode + Default>(
        &mut self,
        desc: ArrayDescriptor,
        elements: &[T],
    ) -> Result<()> {
        self.write_padded(desc.live_count(elements.len()), desc.declared_max as usize, elements)?;
        if (desc.count as usize) < elements.len() {
            trace!("Truncated array to {} of {} elements", desc.count, elements.len());
        }
        Ok(())
    }

    /// Conformant varying array: maximum count, offset and actual count
    /// headers, then `count` elements.
    pub fn write_conformant_varying_array<T: NdrEncode + Default>(
        &mut self,
        desc: ArrayDescriptor,
        elements: &[T],
    ) -> Result<()> {
        self.write_size(u64::from(desc.declared_max))?;
        self.write_varying_elements(desc, elements)
    }

    /// Varying array over a fixed capacity: offset and actual count headers,
    /// then `count` elements.
    pub fn write_varying_array<T: NdrEncode + Default>(
        &mut self,
        capacity: usize,
        count: u32,
        elements: &[T],
    ) -> Result<()> {
        let capacity = length_u32("capacity", capacity)?;
        self.write_varying_elements(ArrayDescriptor::new(count, capacity), elements)
    }

    /// Variance headers and body. `desc.declared_max` bounds the count.
    pub fn write_varying_elements<T: NdrEncode + Default>(
        &mut self,
        desc: ArrayDescriptor,
        elements: &[T],
    ) -> Result<()> {
        if desc.count > desc.declared_max {
            return Err(NdrError::InvalidLength {
                field: "actual_count",
                value: u64::from(desc.count),
                max: u64::from(desc.declared_max),
            });
        }
        self.write_size(0)?;
        self.write_size(u64::from(desc.count))?;
        self.write_padded(desc.live_count(elements.len()), desc.count as usize, elements)
    }

    fn write_padded<T: NdrEncode + Default>(
        &mut self,
        live: usize,
        total: usize,
        elements: &[T],
    ) -> Result<()> {
        for elem in &elements[..live] {
            elem.ndr_encode(self)?;
        }
        if live < total {
            let filler = T::default();
            for _ in live..total {
                filler.ndr_encode(self)?;
            }
        }
        Ok(())
    }
}

impl NdrReader {
    /// Conformant array: reads the maximum count header, then that many
    /// elements.
    pub fn read_array<T: NdrDecode>(&mut self) -> Result<Vec<T>> {
        let max_count = self.read_size()?;
        self.read_array_elements(max_count)
    }

    /// `count` elements, rejecting counts the remaining bytes cannot hold
    /// before anything is allocated.
    pub fn read_array_elements<T: NdrDecode>(&mut self, count: u64) -> Result<Vec<T>> {
        let min_size = T::ndr_min_size(self.context());
        self.ensure_fits(Stage::Array, count, min_size)?;

        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(T::ndr_decode(self)?);
        }
        Ok(elements)
    }

    /// Conformant varying array. Returns the maximum count and the
    /// transmitted elements.
    pub fn read_conformant_varying_array<T: NdrDecode>(&mut self) -> Result<(u64, Vec<T>)> {
        let max_count = self.read_size()?;
        let elements = self.read_varying_elements(max_count)?;
        Ok((max_count, elements))
    }

    /// Varying array over a fixed capacity
    pub fn read_varying_array<T: NdrDecode>(&mut self, capacity: usize) -> Result<Vec<T>> {
        self.read_varying_elements(capacity as u64)
    }

    /// Variance headers and body, checked against `max_count`.
    pub fn read_varying_elements<T: NdrDecode>(&mut self, max_count: u64) -> Result<Vec<T>> {
        let offset = self.read_size()?;
        let actual_count = self.read_size()?;
        if offset != 0 || actual_count > max_count {
            return Err(NdrError::LengthMismatch {
                stage: Stage::Array,
                max_count,
                offset,
                actual_count,
            });
        }
        self.read_array_elements(actual_count)
    }
}

/// Fixed-size array
///
/// Wire format: just the elements (no size prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedArray<T, const N: usize> {
    pub elements: [T; N],
}

impl<T: Default, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self {
            elements: std::array::from_fn(|_| T::default()),
        }
    }
}

impl<T, const N: usize> FixedArray<T, N> {
    pub fn new(elements: [T; N]) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode, const N: usize> NdrEncode for FixedArray<T, N> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        for elem in &self.elements {
            elem.ndr_encode(w)?;
        }
        Ok(())
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        T::ndr_align(ctx)
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        self.elements.iter_mut().try_for_each(NdrEncode::ndr_prepare)
    }

    fn ndr_validate(&self) -> Result<()> {
        self.elements.iter().try_for_each(NdrEncode::ndr_validate)
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for FixedArray<T, N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let elements = r.read_array_elements::<T>(N as u64)?;
        let len = elements.len();
        let elements = elements.try_into().map_err(|_| NdrError::InvalidLength {
            field: "fixed_array",
            value: len as u64,
            max: N as u64,
        })?;
        Ok(Self { elements })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        N * T::ndr_min_size(ctx)
    }
}

/// Conformant array - size determined at runtime
///
/// Wire format:
/// ```text
/// max_count: word     # Maximum elements
/// elements[max_count] # Element data
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantArray<T> {
    pub elements: Vec<T>,
}

impl<T> ConformantArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode + Default> NdrEncode for ConformantArray<T> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        w.write_array(ArrayDescriptor::for_slice(&self.elements)?, &self.elements)
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size().max(T::ndr_align(ctx))
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        self.elements.iter_mut().try_for_each(NdrEncode::ndr_prepare)
    }

    fn ndr_validate(&self) -> Result<()> {
        self.elements.iter().try_for_each(NdrEncode::ndr_validate)
    }
}

impl<T: NdrDecode> NdrDecode for ConformantArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(Self {
            elements: r.read_array()?,
        })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }
}

/// Conformant varying array (`size_is` + `length_is`)
///
/// Wire format:
/// ```text
/// max_count: word
/// offset: word          # Always 0
/// actual_count: word
/// elements[actual_count]
/// ```
///
/// A `max_count` of zero is taken from the number of elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantVaryingArray<T> {
    pub max_count: u32,
    pub elements: Vec<T>,
}

impl<T> ConformantVaryingArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            max_count: 0,
            elements,
        }
    }

    pub fn with_max_count(max_count: u32, elements: Vec<T>) -> Self {
        Self { max_count, elements }
    }

    fn descriptor(&self) -> Result<ArrayDescriptor> {
        let count = length_u32("actual_count", self.elements.len())?;
        let mut max_count = self.max_count;
        reconcile_count(&mut max_count, self.elements.len())?;
        Ok(ArrayDescriptor::new(count, max_count))
    }
}

impl<T: NdrEncode + Default> NdrEncode for ConformantVaryingArray<T> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        w.write_conformant_varying_array(self.descriptor()?, &self.elements)
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size().max(T::ndr_align(ctx))
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        reconcile_count(&mut self.max_count, self.elements.len())?;
        self.elements.iter_mut().try_for_each(NdrEncode::ndr_prepare)
    }

    fn ndr_validate(&self) -> Result<()> {
        self.elements.iter().try_for_each(NdrEncode::ndr_validate)
    }
}

impl<T: NdrDecode> NdrDecode for ConformantVaryingArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let (max_count, elements) = r.read_conformant_varying_array()?;
        let max_count = u32::try_from(max_count).map_err(|_| NdrError::InvalidLength {
            field: "max_count",
            value: max_count,
            max: u64::from(u32::MAX),
        })?;
        Ok(Self { max_count, elements })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        3 * ctx.word_size()
    }
}

/// Varying array - subset of a fixed-capacity array transmitted
///
/// Wire format:
/// ```text
/// offset: word          # Always 0
/// actual_count: word    # Number of transmitted elements, at most N
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingArray<T, const N: usize> {
    pub elements: Vec<T>,
}

impl<T, const N: usize> Default for VaryingArray<T, N> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<T, const N: usize> VaryingArray<T, N> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T: NdrEncode + Default, const N: usize> NdrEncode for VaryingArray<T, N> {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        let count = length_u32("actual_count", self.elements.len())?;
        w.write_varying_array(N, count, &self.elements)
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size().max(T::ndr_align(ctx))
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        self.ndr_validate()?;
        self.elements.iter_mut().try_for_each(NdrEncode::ndr_prepare)
    }

    fn ndr_validate(&self) -> Result<()> {
        crate::check_range("actual_count", self.elements.len() as u64, N as u64)?;
        self.elements.iter().try_for_each(NdrEncode::ndr_validate)
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for VaryingArray<T, N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        Ok(Self {
            elements: r.read_varying_array(N)?,
        })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        2 * ctx.word_size()
    }
}
