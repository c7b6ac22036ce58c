//! Arena manager: turns kernel-obtained regions into seeded blocks, and
//! turns wholly-free seed blocks back into kernel releases.
//!
//! Grounded on spec.md §4.5 directly; the pointer/size bookkeeping mirrors
//! the teacher crate's `allocate`/`deallocate` (`0xErwin1-rallocator/src/
//! bump.rs`) — explicit null checks at the FFI boundary rather than
//! `Result`-wrapping the kernel shim.

use crate::align::PAGE_SIZE;
use crate::block::{self, BlockPtr, HEADER_SIZE};
use crate::kernel;

/// Arena size in pages for the normal (non-oversized) path.
pub const ARENA_PAGES: usize = 16;

/// Normal arena size in bytes, header included.
pub const ARENA_SIZE: usize = ARENA_PAGES * PAGE_SIZE;

/// Largest request servable out of a normal arena's single seed block.
pub const BLOCK_SIZE_MAX: usize = ARENA_SIZE - HEADER_SIZE;

/// Obtains an arena and seeds its sole block. `size` is the arena size
/// *including* the seed block's header: if it exceeds `ARENA_SIZE` an arena
/// of exactly `size` bytes is obtained (the oversized path); otherwise a
/// standard `ARENA_SIZE` arena is obtained regardless of how small `size`
/// is.
///
/// Returns the seed block, never inserted into any free index — the caller
/// decides that — or `None` on kernel out-of-memory.
pub fn arena_alloc(size: usize) -> Option<BlockPtr> {
  let arena_size = if size > ARENA_SIZE { size } else { ARENA_SIZE };
  let raw = kernel::kernel_alloc(arena_size)?;
  let b = raw as BlockPtr;
  unsafe {
    block::arena_init(b, arena_size - HEADER_SIZE);
  }
  Some(b)
}

/// Releases an arena whose sole remaining block is `b` and whose total
/// size (header included) is `arena_size`. The caller must have already
/// removed `b` from the free index, if it was ever inserted.
pub fn arena_release(b: BlockPtr, arena_size: usize) {
  kernel::kernel_free(b as *mut u8, arena_size);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normal_path_always_gets_arena_size() {
    let b = arena_alloc(HEADER_SIZE + 5).expect("kernel_alloc should succeed");
    unsafe {
      assert!((*b).first());
      assert!((*b).last());
      assert_eq!((*b).size_curr(), ARENA_SIZE - HEADER_SIZE);
    }
    arena_release(b, ARENA_SIZE);
  }

  #[test]
  fn oversized_path_gets_exact_size() {
    let oversized = ARENA_SIZE * 3;
    let b = arena_alloc(oversized).expect("kernel_alloc should succeed");
    unsafe {
      assert_eq!((*b).size_curr(), oversized - HEADER_SIZE);
      assert!((*b).first());
      assert!((*b).last());
    }
    arena_release(b, oversized);
  }
}
