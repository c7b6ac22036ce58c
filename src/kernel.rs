//! Kernel VM shim: the allocator's only window onto the operating system.
//!
//! Mirrors the teacher crate's direct-`libc` style (no abstraction layer
//! between this module and the syscalls it wraps) but trades `sbrk` for
//! `mmap`/`munmap`/`madvise`, since the block manager needs page-granular,
//! independently releasable regions rather than one growing break.

use std::ffi::c_void;
use std::ptr;

use crate::align::PAGE_SIZE;

/// Byte pattern debug builds overwrite a trimmed/released range with before
/// handing it back to the OS, so use-after-trim and use-after-release bugs
/// corrupt loudly instead of silently reading stale-but-plausible bytes.
#[cfg(debug_assertions)]
const POISON_BYTE: u8 = 0x7e;

/// Obtains a read-write, zero-initialised, page-aligned region of at least
/// `size` bytes from the OS (`mmap` rounds the length up to a whole number
/// of pages internally; callers that need the exact page count should pass
/// one in already, but an arbitrary `size` is not a contract violation).
///
/// Returns `None` iff the kernel reports out-of-memory (`ENOMEM`). Any
/// other failure is a kernel-contract violation and is fatal.
pub fn kernel_alloc(size: usize) -> Option<*mut u8> {
  if size == 0 {
    return None;
  }

  let addr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      size,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if addr == libc::MAP_FAILED {
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ENOMEM) {
      return None;
    }
    fatal(&format!("kernel_alloc({size}) failed: {err}"));
  }

  // MAP_ANONYMOUS regions come zero-filled from the kernel already; no
  // explicit zeroing needed.
  Some(addr as *mut u8)
}

/// Releases a region previously obtained from `kernel_alloc`. `size` must
/// match the size it was obtained with. Failure is fatal.
pub fn kernel_free(ptr: *mut u8, size: usize) {
  debug_assert!(!ptr.is_null());

  #[cfg(debug_assertions)]
  unsafe {
    std::ptr::write_bytes(ptr, POISON_BYTE, size);
  }

  let rc = unsafe { libc::munmap(ptr as *mut c_void, size) };
  if rc != 0 {
    fatal(&format!(
      "kernel_free({ptr:p}, {size}) failed: {}",
      std::io::Error::last_os_error()
    ));
  }
}

/// Advises the OS that the physical backing of `[ptr, ptr + size)` is no
/// longer needed. The virtual range stays mapped; its contents become
/// undefined. `ptr` and `size` must both be page-aligned. Failure is fatal.
pub fn kernel_reset(ptr: *mut u8, size: usize) {
  debug_assert!(!ptr.is_null());
  debug_assert_eq!(ptr as usize % PAGE_SIZE, 0, "kernel_reset ptr must be page-aligned");
  debug_assert_eq!(size % PAGE_SIZE, 0, "kernel_reset size must be page-aligned");
  if size == 0 {
    return;
  }

  #[cfg(debug_assertions)]
  unsafe {
    std::ptr::write_bytes(ptr, POISON_BYTE, size);
  }

  let rc = unsafe { libc::madvise(ptr as *mut c_void, size, libc::MADV_DONTNEED) };
  if rc != 0 {
    fatal(&format!(
      "kernel_reset({ptr:p}, {size}) failed: {}",
      std::io::Error::last_os_error()
    ));
  }
}

/// A kernel-contract violation: a programmer bug in this shim, not a
/// user-facing error. Matches spec.md §7 — short diagnostic to stderr, then
/// the process terminates with a failure exit code.
fn fatal(msg: &str) -> ! {
  eprintln!("rallocator: fatal: {msg}");
  std::process::abort();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alloc_free_roundtrip() {
    let size = PAGE_SIZE * 4;
    let ptr = kernel_alloc(size).expect("mmap should succeed for a small region");
    unsafe {
      // Freshly mapped anonymous memory must read as zero.
      for i in 0..size {
        assert_eq!(*ptr.add(i), 0);
      }
      ptr::write_bytes(ptr, 0xAB, size);
      assert_eq!(*ptr, 0xAB);
    }
    kernel_free(ptr, size);
  }

  #[test]
  fn reset_releases_without_unmapping() {
    let size = PAGE_SIZE * 2;
    let ptr = kernel_alloc(size).unwrap();
    unsafe {
      ptr::write_bytes(ptr, 0x11, size);
    }
    kernel_reset(ptr, size);
    // The range stays mapped (no segfault); contents are unspecified, so we
    // only assert the call itself completed and the region remains valid to
    // touch.
    unsafe {
      ptr::write_bytes(ptr, 0x22, size);
      assert_eq!(*ptr, 0x22);
    }
    kernel_free(ptr, size);
  }
}
