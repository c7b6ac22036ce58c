//! The in-band block header: three machine words prefixed to every
//! allocated and every free region, plus the implicit neighbour chain and
//! the split/merge operations that carve and combine blocks.
//!
//! Grounded on the teacher crate's `Block` (`0xErwin1-rallocator/src/
//! block.rs`), generalised from a free-standing 3-field struct into the
//! packed/flagged header the block manager needs, with the teacher's raw-
//! pointer, directly-`unsafe` style kept throughout.

use std::mem::size_of;

use crate::align::ALIGN;

const BUSY: usize = 1 << 0;
const LAST: usize = 1 << 1;
const FLAG_MASK: usize = BUSY | LAST;
const SIZE_MASK: usize = !FLAG_MASK;

/// The in-band header. `size_curr`'s low two bits double as the `BUSY` and
/// `LAST` flags; every accessor below masks them off or preserves them as
/// spec.md §3 requires. `FIRST` is never stored — it's `size_prev == 0`.
#[repr(C)]
pub struct BlockHeader {
  size_curr: usize,
  size_prev: usize,
  offset: usize,
}

/// Raw pointer to a block header. Kept as a bare pointer rather than a
/// wrapper type, matching the teacher's `*mut Block` style — every function
/// here is `unsafe` and documents its own precondition instead of leaning on
/// a newtype to enforce one.
pub type BlockPtr = *mut BlockHeader;

/// Header size, rounded up to `ALIGN` as spec.md §3 requires.
pub const HEADER_SIZE: usize = (size_of::<BlockHeader>() + ALIGN - 1) & !(ALIGN - 1);

/// Minimum payload size. Ordinarily this must be at least
/// `size_of::<tree_node>()` since the free index's node lives in the
/// payload; this crate stores the free index off-payload in a side table
/// instead (see `crate::tree` and `SPEC_FULL.md` §3), so the minimum
/// collapses to one aligned word.
pub const BLOCK_SIZE_MIN: usize = ALIGN;

/// Address of a block's payload, given the block's header address.
pub fn payload_of(b: BlockPtr) -> *mut u8 {
  unsafe { (b as *mut u8).add(HEADER_SIZE) }
}

/// Address of a block's header, given a payload pointer previously
/// returned to the user.
pub fn block_of(p: *mut u8) -> BlockPtr {
  unsafe { p.sub(HEADER_SIZE) as BlockPtr }
}

impl BlockHeader {
  /// Current size, flag bits masked off.
  pub fn size_curr(&self) -> usize {
    self.size_curr & SIZE_MASK
  }

  /// Sets the current size, preserving whatever flag bits are set.
  pub fn set_size_curr(&mut self, size: usize) {
    debug_assert_eq!(size & FLAG_MASK, 0, "size_curr must have its low two bits clear");
    debug_assert_eq!(size % ALIGN, 0, "size_curr must be ALIGN-aligned");
    self.size_curr = size | (self.size_curr & FLAG_MASK);
  }

  pub fn size_prev(&self) -> usize {
    self.size_prev
  }

  pub fn set_size_prev(&mut self, size_prev: usize) {
    self.size_prev = size_prev;
  }

  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn set_offset(&mut self, offset: usize) {
    self.offset = offset;
  }

  pub fn busy(&self) -> bool {
    self.size_curr & BUSY != 0
  }

  pub fn set_busy(&mut self) {
    self.size_curr |= BUSY;
  }

  pub fn clear_busy(&mut self) {
    self.size_curr &= !BUSY;
  }

  pub fn last(&self) -> bool {
    self.size_curr & LAST != 0
  }

  pub fn set_last(&mut self) {
    self.size_curr |= LAST;
  }

  pub fn clear_last(&mut self) {
    self.size_curr &= !LAST;
  }

  /// `FIRST` is derived, never stored: true iff there's no physical
  /// predecessor in this arena.
  pub fn first(&self) -> bool {
    self.size_prev == 0
  }
}

/// The block physically following `b`. Caller must have verified `¬LAST(b)`.
pub unsafe fn next(b: BlockPtr) -> BlockPtr {
  unsafe {
    debug_assert!(!(*b).last(), "next() called on the last block of its arena");
    (b as *mut u8).add(HEADER_SIZE + (*b).size_curr()) as BlockPtr
  }
}

/// The block physically preceding `b`. Caller must have verified
/// `¬FIRST(b)`.
pub unsafe fn prev(b: BlockPtr) -> BlockPtr {
  unsafe {
    debug_assert!(!(*b).first(), "prev() called on the first block of its arena");
    (b as *mut u8).sub(HEADER_SIZE + (*b).size_prev()) as BlockPtr
  }
}

/// Seeds a fresh arena's sole block: `BUSY=0, LAST=1, size_prev=0, offset=0`.
pub unsafe fn arena_init(b: BlockPtr, size: usize) {
  unsafe {
    debug_assert_eq!(size % ALIGN, 0);
    (*b).size_curr = size | LAST;
    (*b).size_prev = 0;
    (*b).offset = 0;
  }
}

/// Clears `BUSY` and `LAST`. Size, `size_prev`, and `offset` must be filled
/// in separately by the caller — this only guarantees the flag bits start
/// clean.
pub unsafe fn block_init(b: BlockPtr) {
  unsafe {
    (*b).size_curr &= SIZE_MASK;
  }
}

/// Carves a block out of `b` to satisfy a request of exactly `req` bytes
/// (already aligned, already `≥ BLOCK_SIZE_MIN`, already `≤ size_curr(b)`).
/// Marks `b` `BUSY` as a side effect — by contract, `split` is only called
/// while handing `b` out.
///
/// Returns the free remainder block if one was carved (not yet inserted
/// into any free index — the caller does that), or `None` if the leftover
/// space was too small to host a block of its own, in which case the whole
/// of `b` is handed out unsplit.
pub unsafe fn split(b: BlockPtr, req: usize) -> Option<BlockPtr> {
  unsafe {
    debug_assert_eq!(req % ALIGN, 0);
    debug_assert!(req >= BLOCK_SIZE_MIN);
    debug_assert!(req <= (*b).size_curr());

    (*b).set_busy();

    let size_curr = (*b).size_curr();
    let rest = size_curr - req;
    if rest < HEADER_SIZE + BLOCK_SIZE_MIN {
      return None;
    }

    let was_last = (*b).last();
    let offset_b = (*b).offset();

    (*b).set_size_curr(req);

    let r = (b as *mut u8).add(HEADER_SIZE + req) as BlockPtr;
    block_init(r);
    (*r).set_size_curr(rest - HEADER_SIZE);
    (*r).set_size_prev(req);
    (*r).set_offset(offset_b + req + HEADER_SIZE);

    if was_last {
      (*b).clear_last();
      (*r).set_last();
    } else {
      let n = next(r);
      (*n).set_size_prev((*r).size_curr());
    }

    Some(r)
  }
}

/// Merges free block `r` into its physical predecessor `b`. Preconditions:
/// `next(b) == r` and `¬BUSY(r)`. `r`'s storage becomes part of `b`'s
/// payload; `r` must not be referenced again afterward.
pub unsafe fn merge(b: BlockPtr, r: BlockPtr) {
  unsafe {
    debug_assert!(!(*b).last());
    debug_assert!(!(*r).busy());
    debug_assert_eq!(
      r as usize,
      (b as usize) + HEADER_SIZE + (*b).size_curr(),
      "merge requires r == next(b)"
    );

    let new_size = (*b).size_curr() + (*r).size_curr() + HEADER_SIZE;
    let r_last = (*r).last();
    (*b).set_size_curr(new_size);

    if r_last {
      (*b).set_last();
    } else {
      let n = next(b);
      (*n).set_size_prev(new_size);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::alloc::{alloc, dealloc, Layout};

  fn with_raw_arena(size: usize, f: impl FnOnce(BlockPtr)) {
    let layout = Layout::from_size_align(size, ALIGN).unwrap();
    unsafe {
      let raw = alloc(layout);
      assert!(!raw.is_null());
      let b = raw as BlockPtr;
      arena_init(b, size - HEADER_SIZE);
      f(b);
      dealloc(raw, layout);
    }
  }

  #[test]
  fn arena_init_seeds_first_and_last() {
    with_raw_arena(HEADER_SIZE + 256, |b| unsafe {
      assert!((*b).first());
      assert!((*b).last());
      assert!(!(*b).busy());
      assert_eq!((*b).size_curr(), 256);
      assert_eq!((*b).offset(), 0);
    });
  }

  #[test]
  fn split_carves_remainder_and_fixes_links() {
    with_raw_arena(HEADER_SIZE + 256, |b| unsafe {
      let r = split(b, 64).expect("256 - 64 leaves room for a remainder block");
      assert!((*b).busy());
      assert_eq!((*b).size_curr(), 64);
      assert!(!(*b).last());
      assert!((*r).last());
      assert!(!(*r).busy());
      assert_eq!((*r).size_prev(), 64);
      assert_eq!((*r).offset(), 64 + HEADER_SIZE);
      assert_eq!((*r).size_curr(), 256 - 64 - HEADER_SIZE);
      assert_eq!(next(b), r);
    });
  }

  #[test]
  fn split_returns_none_when_remainder_too_small() {
    with_raw_arena(HEADER_SIZE + BLOCK_SIZE_MIN, |b| unsafe {
      let r = split(b, BLOCK_SIZE_MIN);
      assert!(r.is_none());
      assert!((*b).busy());
      assert_eq!((*b).size_curr(), BLOCK_SIZE_MIN);
    });
  }

  #[test]
  fn merge_reverses_split() {
    with_raw_arena(HEADER_SIZE + 256, |b| unsafe {
      let r = split(b, 64).unwrap();
      (*b).clear_busy();
      merge(b, r);
      assert_eq!((*b).size_curr(), 256);
      assert!((*b).last());
      assert!(!(*b).busy());
    });
  }

  #[test]
  fn middle_block_size_prev_repaired_after_split_and_merge() {
    with_raw_arena(HEADER_SIZE * 2 + 512, |b| unsafe {
      // b: 512 + HEADER_SIZE payload. Split off a 64-byte head, then a
      // further 64-byte head from the remainder, leaving three blocks.
      let r1 = split(b, 64).unwrap();
      let r2 = split(r1, 64).unwrap();
      assert_eq!((*r2).size_prev(), 64);
      assert_eq!(next(r1), r2);

      // Freeing r1 and merging it back into b must repair r2's size_prev.
      (*r1).clear_busy();
      merge(b, r1);
      assert_eq!(next(b), r2);
      assert_eq!((*r2).size_prev(), (*b).size_curr());
    });
  }
}
