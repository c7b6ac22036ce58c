//! Randomised-workload invariant checks, driven by a seeded RNG for
//! deterministic ("golden master") reproduction.
//!
//! Each live allocation is shadowed by a distinct sentinel byte. After
//! every operation we re-verify every still-live allocation's sentinel
//! range in full, catching the two failure modes a block-manager bug would
//! actually produce: a corrupted neighbour header that misplaces some
//! later split/merge, or a payload boundary computed one word off.

use rallocator::{Allocator, ALIGN};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

struct Live {
  ptr: *mut u8,
  size: usize,
  sentinel: u8,
}

unsafe fn fill(ptr: *mut u8, size: usize, sentinel: u8) {
  unsafe { std::ptr::write_bytes(ptr, sentinel, size) };
}

unsafe fn verify_all(live: &[Live]) {
  unsafe {
    for l in live {
      for i in 0..l.size {
        assert_eq!(
          *l.ptr.add(i),
          l.sentinel,
          "sentinel corrupted for a {}-byte block at offset {i}",
          l.size
        );
      }
    }
  }
}

fn run_workload(seed: u64, iterations: usize) {
  let mut rng = ChaCha8Rng::seed_from_u64(seed);
  let mut a = Allocator::new();
  let mut live: Vec<Live> = Vec::new();
  let mut next_sentinel: u8 = 1;

  unsafe {
    for _ in 0..iterations {
      let action = rng.gen_range(0..10);
      if action < 6 || live.is_empty() {
        // Allocate. Mostly small/medium sizes, occasionally an oversized
        // request, to exercise both the normal and oversized paths.
        let size = if rng.gen_bool(0.1) {
          rng.gen_range(70_000..200_000)
        } else {
          rng.gen_range(1..8192)
        };
        let ptr = a.allocate(size);
        assert!(!ptr.is_null(), "allocate({size}) unexpectedly failed");
        assert_eq!(ptr as usize % ALIGN, 0, "returned pointer must be ALIGN-aligned");
        let sentinel = next_sentinel;
        next_sentinel = next_sentinel.wrapping_add(1);
        fill(ptr, size, sentinel);
        live.push(Live { ptr, size, sentinel });
      } else if action < 8 {
        // Free a random live allocation.
        let idx = rng.gen_range(0..live.len());
        let l = live.swap_remove(idx);
        a.free(l.ptr);
      } else {
        // Resize a random live allocation, re-stamping its sentinel since
        // its size (and possibly address) changed.
        let idx = rng.gen_range(0..live.len());
        let new_size = if rng.gen_bool(0.1) {
          rng.gen_range(70_000..200_000)
        } else {
          rng.gen_range(1..8192)
        };
        let old = &live[idx];
        let new_ptr = a.resize(old.ptr, new_size);
        assert!(!new_ptr.is_null(), "resize(_, {new_size}) unexpectedly failed");
        assert_eq!(new_ptr as usize % ALIGN, 0);
        let sentinel = next_sentinel;
        next_sentinel = next_sentinel.wrapping_add(1);
        fill(new_ptr, new_size, sentinel);
        live[idx] = Live { ptr: new_ptr, size: new_size, sentinel };
      }

      verify_all(&live);
    }

    for l in live {
      a.free(l.ptr);
    }
  }
}

#[test]
fn randomised_workload_never_corrupts_a_live_block_seed_1() {
  run_workload(1, 500);
}

#[test]
fn randomised_workload_never_corrupts_a_live_block_seed_2() {
  run_workload(0xC0FFEE, 500);
}

#[test]
fn randomised_workload_is_reproducible_given_the_same_seed() {
  // Not a correctness property by itself, but pins down that nothing in the
  // allocator depends on ambient nondeterminism (e.g. address-dependent
  // hashing) that would make a seeded workload flaky.
  run_workload(42, 200);
  run_workload(42, 200);
}
