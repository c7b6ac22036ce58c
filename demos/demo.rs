use std::io::Read;

use rallocator::Allocator;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change as arenas
/// are obtained and released.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  let mut a = Allocator::new();

  unsafe {
    a.show("start");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate a small block. The first allocation of any size obtains
    //    a full arena from the kernel and carves this block from its head.
    // ------------------------------------------------------------------
    let first = a.allocate(32);
    println!("\n[1] Allocate 32 bytes -> {first:?}");
    a.show("[1] after allocate");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate another small block from the same arena's free remainder.
    // ------------------------------------------------------------------
    let second = a.allocate(512);
    println!("\n[2] Allocate 512 bytes -> {second:?}");
    a.show("[2] after allocate");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Grow the second block in place: it has a free right neighbour
    //    (the arena's remainder) large enough to absorb the request.
    // ------------------------------------------------------------------
    let second = a.resize(second, 2048);
    println!("\n[3] Resize second block up to 2048 bytes -> {second:?}");
    a.show("[3] after resize");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Free the first block. With no free neighbour on its left and a
    //    busy neighbour on its right, it simply re-enters the free index.
    // ------------------------------------------------------------------
    a.free(first);
    println!("\n[4] Freed first block at {first:?}");
    a.show("[4] after free");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Allocate a block that fits in the gap left by the first block,
    //    demonstrating best-fit reuse of a freed block over extending
    //    further into the arena.
    // ------------------------------------------------------------------
    let third = a.allocate(16);
    println!(
      "\n[5] Allocate 16 bytes -> {third:?} (reused freed block? {})",
      third == first
    );
    a.show("[5] after allocate");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 6) Allocate a request larger than one normal arena can ever serve.
    //    This takes the oversized path: a dedicated arena sized exactly
    //    to the request.
    // ------------------------------------------------------------------
    let big = a.allocate(rallocator::BLOCK_SIZE_MAX + 4096);
    println!("\n[6] Allocate an oversized block -> {big:?}");
    a.show("[6] after oversized allocate");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 7) Free everything. The last free in each arena releases that
    //    arena back to the kernel entirely.
    // ------------------------------------------------------------------
    a.free(third);
    a.free(second);
    a.free(big);
    println!("\n[7] Freed all remaining blocks");
    a.show("[7] after freeing everything");

    println!("\n[8] End of demo. Process will exit and the kernel reclaims all memory.");
  }
}
