//! Guard-zoned vector storage.
//!
//! Storage layout, in 16-byte blocks:
//!
//! ```text
//! | head guard (32 B) | misalign pad | payload (count x element) | tail guard (>= 32 B) |
//! ```
//!
//! Every byte outside the payload is part of the guard region. It is
//! filled with a per-vector pseudo-random pattern and summarised by a
//! 64-bit FNV-1a checksum; [`Vector::check_intact`] recomputes the
//! checksum and, on mismatch, locates the corrupted byte closest to the
//! payload.

use std::any::type_name;
use std::io::{self, Read};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use tracing::trace;

use crate::error::{GuardSide, GuardViolation, VectorError};
use crate::format::{BaseFormat, Element, Format, Scalar};

/// Alignment boundary of vector storage in bytes.
pub const ALIGNMENT: usize = 16;
/// Minimum guard zone on each side of the payload.
pub const GUARD_BYTES: usize = 32;
/// Largest payload a single vector may hold.
pub const MAX_VECTOR_BYTES: usize = 1 << 30;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const SEED_STEP: u64 = 0x9e37_79b9_7f4a_7c15;

static NEXT_SEED: AtomicU64 = AtomicU64::new(1);

/// Placement of the payload relative to the alignment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Payload starts on a 16-byte boundary.
    #[default]
    Aligned,
    /// Payload starts off the boundary by one element (at most 8 bytes),
    /// keeping natural alignment of the base type.
    Unaligned,
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Block([u8; ALIGNMENT]);

/// An owned, typed, guard-zoned buffer.
#[derive(derive_more::Debug)]
pub struct Vector {
    #[debug(skip)]
    storage: Vec<Block>,
    format: Format,
    count: usize,
    alignment: Alignment,
    payload: Range<usize>,
    seed: u64,
    guard_checksum: u64,
}

fn layout(
    count: usize,
    alignment: Alignment,
    format: Format,
) -> Result<(Range<usize>, usize), VectorError> {
    let element_size = format.element_size();
    let len = count
        .checked_mul(element_size)
        .filter(|&len| len <= MAX_VECTOR_BYTES)
        .ok_or(VectorError::TooLarge {
            count,
            element_size,
        })?;
    let misalign = match alignment {
        Alignment::Aligned => 0,
        Alignment::Unaligned => element_size.min(ALIGNMENT / 2),
    };
    let start = GUARD_BYTES + misalign;
    let end = start + len;
    let total = (end + GUARD_BYTES).next_multiple_of(ALIGNMENT);
    Ok((start..end, total / ALIGNMENT))
}

fn pattern_byte(seed: u64, pos: usize) -> u8 {
    let mut x = seed ^ (pos as u64).wrapping_mul(SEED_STEP);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 29;
    (x >> 24) as u8
}

fn guard_checksum(bytes: &[u8], payload: &Range<usize>) -> u64 {
    bytes[..payload.start]
        .iter()
        .chain(&bytes[payload.end..])
        .fold(FNV_OFFSET, |hash, &b| {
            (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
        })
}

fn read_scalar<T: Element>(bytes: &[u8]) -> Scalar {
    bytemuck::pod_read_unaligned::<T>(bytes).to_scalar()
}

impl Vector {
    /// Allocates a vector for `count` elements of `format`.
    ///
    /// The payload is zeroed, or copied from `init` which must be exactly
    /// `count * element_size` bytes.
    pub fn allocate(
        count: usize,
        alignment: Alignment,
        format: Format,
        init: Option<&[u8]>,
    ) -> Result<Self, VectorError> {
        let (payload, blocks) = layout(count, alignment, format)?;
        if let Some(init) = init
            && init.len() != payload.len()
        {
            return Err(VectorError::InitSize {
                expected: payload.len(),
                actual: init.len(),
            });
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(blocks)
            .map_err(|_| VectorError::Allocation {
                bytes: blocks * ALIGNMENT,
            })?;
        storage.resize(blocks, Block::zeroed());

        let seed = NEXT_SEED
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_mul(SEED_STEP);
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut storage);
        let total = bytes.len();
        for pos in (0..payload.start).chain(payload.end..total) {
            bytes[pos] = pattern_byte(seed, pos);
        }
        if let Some(init) = init {
            bytes[payload.clone()].copy_from_slice(init);
        }
        let guard_checksum = guard_checksum(bytes, &payload);

        trace!(%format, count, ?alignment, bytes = total, "allocated vector");
        Ok(Self {
            storage,
            format,
            count,
            alignment,
            payload,
            seed,
            guard_checksum,
        })
    }

    /// Allocates a zero-filled vector.
    pub fn zeroed(count: usize, alignment: Alignment, format: Format) -> Result<Self, VectorError> {
        Self::allocate(count, alignment, format, None)
    }

    /// Allocates a vector holding a copy of `data` (base values; two per
    /// element for complex formats).
    pub fn from_slice<T: Element>(
        alignment: Alignment,
        format: Format,
        data: &[T],
    ) -> Result<Self, VectorError> {
        check_view::<T>(format)?;
        let parts = format.parts();
        if data.len() % parts != 0 {
            return Err(VectorError::InitSize {
                expected: data.len().next_multiple_of(parts) * format.base.size(),
                actual: size_of_val(data),
            });
        }
        Self::allocate(
            data.len() / parts,
            alignment,
            format,
            Some(bytemuck::cast_slice(data)),
        )
    }

    /// Duplicates contents, format and alignment into fresh storage.
    pub fn try_clone(&self) -> Result<Self, VectorError> {
        Self::allocate(self.count, self.alignment, self.format, Some(self.bytes()))
    }

    /// Verifies the guard zones and releases the storage.
    ///
    /// The memory is released even when the check fails.
    pub fn free(self) -> Result<(), GuardViolation> {
        let result = self.check_intact();
        trace!(format = %self.format, count = self.count, ok = result.is_ok(), "freed vector");
        result
    }

    /// Verifies that nothing outside the payload was written.
    pub fn check_intact(&self) -> Result<(), GuardViolation> {
        let bytes = self.storage_bytes();
        if guard_checksum(bytes, &self.payload) == self.guard_checksum {
            return Ok(());
        }
        let head = (0..self.payload.start).rev().map(|pos| (GuardSide::Head, pos));
        let tail = (self.payload.end..bytes.len()).map(|pos| (GuardSide::Tail, pos));
        for (side, pos) in head.chain(tail) {
            let expected = pattern_byte(self.seed, pos);
            if bytes[pos] != expected {
                let distance = match side {
                    GuardSide::Head => self.payload.start - pos,
                    GuardSide::Tail => pos - self.payload.end + 1,
                };
                return Err(GuardViolation {
                    side,
                    distance,
                    expected,
                    found: bytes[pos],
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of base values (`count` times 2 for complex formats).
    #[inline]
    pub fn base_len(&self) -> usize {
        self.count * self.format.parts()
    }

    #[inline]
    pub fn element_size(&self) -> usize {
        self.format.element_size()
    }

    /// Payload size in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }

    /// Total storage size in bytes, guard zones included.
    #[inline]
    pub fn allocated_size(&self) -> usize {
        self.storage.len() * ALIGNMENT
    }

    #[inline]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Distance of the payload start from the previous alignment boundary.
    #[inline]
    pub fn offset(&self) -> usize {
        self.payload.start % ALIGNMENT
    }

    pub fn bytes(&self) -> &[u8] {
        &self.storage_bytes()[self.payload.clone()]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let payload = self.payload.clone();
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.storage)[payload]
    }

    /// Typed view of the payload as base values.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], VectorError> {
        check_view::<T>(self.format)?;
        bytemuck::try_cast_slice(self.bytes()).map_err(|_| VectorError::TypeMismatch {
            format: self.format,
            requested: type_name::<T>(),
        })
    }

    /// Mutable typed view of the payload as base values.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T], VectorError> {
        check_view::<T>(self.format)?;
        let format = self.format;
        bytemuck::try_cast_slice_mut(self.bytes_mut()).map_err(|_| VectorError::TypeMismatch {
            format,
            requested: type_name::<T>(),
        })
    }

    /// Start of the payload, for kernels called through raw pointers.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes().as_ptr()
    }

    /// Mutable start of the payload, for kernels called through raw pointers.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes_mut().as_mut_ptr()
    }

    /// Whole backing storage, guard zones included, and the payload range
    /// within it.
    ///
    /// Writes outside the returned range are reported by the next
    /// [`check_intact`](Self::check_intact) or [`free`](Self::free).
    pub fn whole_mut(&mut self) -> (&mut [u8], Range<usize>) {
        (
            bytemuck::cast_slice_mut(&mut self.storage),
            self.payload.clone(),
        )
    }

    /// Base value at `index`, widened for diagnostics.
    pub fn get_scalar(&self, index: usize) -> Option<Scalar> {
        let size = self.format.base.size();
        let bytes = self.bytes().get(index * size..(index + 1) * size)?;
        Some(match self.format.base {
            BaseFormat::U8 => read_scalar::<u8>(bytes),
            BaseFormat::I8 => read_scalar::<i8>(bytes),
            BaseFormat::U16 => read_scalar::<u16>(bytes),
            BaseFormat::I16 | BaseFormat::Fract16 => read_scalar::<i16>(bytes),
            BaseFormat::U32 => read_scalar::<u32>(bytes),
            BaseFormat::I32 | BaseFormat::Fract32 => read_scalar::<i32>(bytes),
            BaseFormat::U64 => read_scalar::<u64>(bytes),
            BaseFormat::I64 => read_scalar::<i64>(bytes),
            BaseFormat::Float16 => read_scalar::<half::f16>(bytes),
            BaseFormat::Float32 => read_scalar::<f32>(bytes),
            BaseFormat::Float64 => read_scalar::<f64>(bytes),
        })
    }

    /// Same format, same count, identical payload bits.
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.format == other.format && self.count == other.count && self.bytes() == other.bytes()
    }

    /// Index of the first base value whose bits differ from `other`. A
    /// payload that ends early differs at its end.
    pub fn first_difference(&self, other: &Self) -> Option<usize> {
        let size = self.format.base.size();
        let (ours, theirs) = (self.bytes(), other.bytes());
        ours.chunks_exact(size)
            .zip(theirs.chunks_exact(size))
            .position(|(a, b)| a != b)
            .or_else(|| {
                (ours.len() != theirs.len()).then(|| ours.len().min(theirs.len()) / size)
            })
    }

    /// Copies the payload of `src`, which must have the same byte size.
    pub fn copy_from(&mut self, src: &Self) -> Result<(), VectorError> {
        if self.byte_len() != src.byte_len() {
            return Err(VectorError::Mismatch {
                what: "copy",
                left: (self.format, self.count),
                right: (src.format, src.count),
            });
        }
        self.bytes_mut().copy_from_slice(src.bytes());
        Ok(())
    }

    /// Fills the payload from a little-endian byte stream.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<()> {
        let base = self.format.base.size();
        let payload = self.bytes_mut();
        reader.read_exact(payload)?;
        if cfg!(target_endian = "big") && base > 1 {
            for chunk in payload.chunks_exact_mut(base) {
                chunk.reverse();
            }
        }
        Ok(())
    }

    fn storage_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.storage)
    }
}

fn check_view<T: Element>(format: Format) -> Result<(), VectorError> {
    if T::accepts(format.base) {
        Ok(())
    } else {
        Err(VectorError::TypeMismatch {
            format,
            requested: type_name::<T>(),
        })
    }
}

/// Allocates one vector per entry of `counts`, all of one format.
///
/// All-or-nothing: if any allocation fails, the vectors allocated so far
/// are released and [`VectorError::Partial`] reports how many succeeded.
pub fn allocate_many(
    alignment: Alignment,
    format: Format,
    counts: &[usize],
) -> Result<Vec<Vector>, VectorError> {
    let mut out = Vec::with_capacity(counts.len());
    for &count in counts {
        match Vector::zeroed(count, alignment, format) {
            Ok(v) => out.push(v),
            Err(err) => {
                let allocated = out.len();
                trace!(%err, allocated, "rolling back clustered allocation");
                for v in out {
                    // Nothing was handed out yet, so the guards cannot be damaged.
                    let _ = v.free();
                }
                return Err(VectorError::Partial {
                    allocated,
                    requested: counts.len(),
                });
            }
        }
    }
    Ok(out)
}
