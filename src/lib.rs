//! # rallocator - a general-purpose dynamic memory allocator core
//!
//! This crate implements the allocation core a `malloc`/`free`/`realloc`
//! family would sit on top of: in-band block headers, an implicit
//! doubly-linked chain of physically adjacent blocks, a size-indexed free
//! list for best-fit search, splitting on allocate, coalescing on free, and
//! page-level trimming back to the kernel.
//!
//! ## Crate structure
//!
//! ```text
//!   rallocator
//!   ├── align      - alignment macros and constants (align!, align_to!)
//!   ├── kernel     - the only module that talks to the OS (mmap/munmap/madvise)
//!   ├── block      - block header layout, the physical neighbour chain, split/merge
//!   ├── tree       - the free-block index (best-fit lookup)
//!   ├── arena      - turns kernel regions into seeded blocks and back
//!   └── allocator  - the public façade: allocate/free/resize/show
//! ```
//!
//! ## Block layout
//!
//! Every block, free or busy, is prefixed by a fixed-size header:
//!
//! ```text
//!   ┌────────────────────────┬──────────────────────────────────┐
//!   │   size_curr (BUSY|LAST)│                                  │
//!   │   size_prev            │           payload                │
//!   │   offset               │                                  │
//!   └────────────────────────┴──────────────────────────────────┘
//!                            ▲
//!                            └── pointer returned to the caller
//! ```
//!
//! `size_curr`'s low two bits double as the `BUSY` and `LAST` flags; `FIRST`
//! is derived rather than stored (`size_prev == 0`). Blocks within one arena
//! form an implicit doubly-linked list purely through address arithmetic —
//! no `next`/`prev` pointers are stored.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use rallocator::Allocator;
//!
//! let mut a = Allocator::new();
//! unsafe {
//!     let p = a.allocate(128);
//!     let p = a.resize(p, 512);
//!     a.free(p);
//! }
//! ```
//!
//! ## Safety
//!
//! This crate is inherently unsafe: it manages raw memory below the layer
//! where Rust's ownership model applies. Every method that touches a
//! payload pointer is `unsafe` and documents its own preconditions rather
//! than trying to encode them in the type system.
//!
//! ## Concurrency
//!
//! `Allocator` holds no internal synchronization; callers needing a shared
//! allocator must provide their own (e.g. a `Mutex<Allocator>`). Threading
//! is explicitly out of scope for this core.

pub mod align;
mod arena;
mod block;
mod kernel;
mod tree;

mod allocator;

pub use align::{ALIGN, PAGE_SIZE};
pub use allocator::Allocator;
pub use arena::{ARENA_SIZE, BLOCK_SIZE_MAX};
pub use block::{BLOCK_SIZE_MIN, HEADER_SIZE};
