//! Integration tests for the cache model and the memory hierarchy.

use riscv_multicore_sim::config::{CacheGeometry, CacheParams, ReplacementPolicy};
use riscv_multicore_sim::mem::{Backing, Cache, MainMemory, MemoryHierarchy, Scratchpad};

/// A small 2-way cache with four sets of 16-byte blocks.
fn small_geometry(policy: ReplacementPolicy) -> CacheGeometry {
    CacheGeometry {
        size_bytes: 128,
        block_bytes: 16,
        associativity: 2,
        latency: 1,
        policy,
    }
}

fn small_cache(policy: ReplacementPolicy) -> (Cache, MainMemory) {
    let cache = Cache::new("L1D", &small_geometry(policy)).expect("valid geometry");
    (cache, MainMemory::new(4096, 10))
}

/// Cache parameters scaled down so eviction is easy to provoke.
fn small_params() -> CacheParams {
    let mut params = CacheParams::default();
    params.l1i = small_geometry(ReplacementPolicy::Lru);
    params.l1d = small_geometry(ReplacementPolicy::Lru);
    params.l2 = CacheGeometry {
        size_bytes: 512,
        block_bytes: 16,
        associativity: 4,
        latency: 2,
        policy: ReplacementPolicy::Lru,
    };
    params.mem_latency = 10;
    params.spm_size = 256;
    params.spm_latency = 1;
    params
}

/// Tests that cache construction derives the set count from the geometry.
#[test]
fn test_cache_creation() {
    let (cache, _) = small_cache(ReplacementPolicy::Lru);
    assert_eq!(cache.num_sets(), 4);
    assert_eq!(cache.block_bytes(), 16);
    assert_eq!(cache.access_latency(), 1);
}

/// Tests that invalid geometry is rejected at construction.
#[test]
fn test_cache_bad_geometry() {
    let mut geom = small_geometry(ReplacementPolicy::Lru);
    geom.size_bytes = 100;
    assert!(Cache::new("L1D", &geom).is_err());

    let mut geom = small_geometry(ReplacementPolicy::Lru);
    geom.block_bytes = 0;
    assert!(Cache::new("L1D", &geom).is_err());

    // 96 / (16 * 2) = 3 sets, not a power of two.
    let mut geom = small_geometry(ReplacementPolicy::Lru);
    geom.size_bytes = 96;
    assert!(Cache::new("L1D", &geom).is_err());
}

/// Tests the miss-then-hit pattern of a cold read.
#[test]
fn test_cache_read_miss_then_hit() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);
    mem.set_word(0x40, 1234);

    let (latency, data) = cache.read(0x40, 4, &mut mem);
    assert_eq!(latency, 11);
    assert_eq!(i32::from_le_bytes(data[..4].try_into().unwrap()), 1234);
    assert!(cache.contains(0x40));

    let (latency, data) = cache.read(0x40, 4, &mut mem);
    assert_eq!(latency, 1);
    assert_eq!(i32::from_le_bytes(data[..4].try_into().unwrap()), 1234);

    let stats = cache.stats();
    assert_eq!(stats.accesses, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

/// Tests that a write stays local (write-back) until the line is evicted.
#[test]
fn test_cache_write_back_on_eviction() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.write(0x00, &77i32.to_le_bytes(), &mut mem);
    assert_eq!(mem.word(0x00), 0, "write-back must not reach memory yet");

    // Addresses 0x40 and 0x80 map to set 0 as well; the second fill
    // evicts the dirty line at 0x00.
    cache.read(0x40, 4, &mut mem);
    cache.read(0x80, 4, &mut mem);

    assert!(!cache.contains(0x00));
    assert_eq!(mem.word(0x00), 77, "eviction must write the dirty line back");
}

/// Tests that a write miss allocates the line (write-allocate).
#[test]
fn test_cache_write_allocate() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);
    mem.set_word(0x24, 5);

    cache.write(0x20, &9i32.to_le_bytes(), &mut mem);
    assert!(cache.contains(0x20));

    // The rest of the block was filled from memory by the allocation.
    let (_, data) = cache.read(0x24, 4, &mut mem);
    assert_eq!(i32::from_le_bytes(data[..4].try_into().unwrap()), 5);
}

/// Tests LRU eviction: the least recently touched way is the victim.
#[test]
fn test_cache_replacement_lru() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.read(0x00, 4, &mut mem);
    cache.read(0x40, 4, &mut mem);
    // Touch 0x00 so 0x40 becomes the LRU line.
    cache.read(0x00, 4, &mut mem);

    cache.read(0x80, 4, &mut mem);
    assert!(cache.contains(0x00));
    assert!(!cache.contains(0x40));
    assert!(cache.contains(0x80));
}

/// Tests FIFO eviction: arrival order decides, touches do not.
#[test]
fn test_cache_replacement_fifo() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Fifo);

    cache.read(0x00, 4, &mut mem);
    cache.read(0x40, 4, &mut mem);
    // A hit must not move 0x00 out of the eviction front.
    cache.read(0x00, 4, &mut mem);

    cache.read(0x80, 4, &mut mem);
    assert!(!cache.contains(0x00));
    assert!(cache.contains(0x40));
    assert!(cache.contains(0x80));
}

/// Tests that flush writes dirty lines down but keeps them resident.
#[test]
fn test_cache_flush() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.write(0x10, &3i32.to_le_bytes(), &mut mem);
    cache.flush(&mut mem);

    assert_eq!(mem.word(0x10), 3);
    assert!(cache.contains(0x10));
}

/// Tests that invalidate_all drops lines without writing them back.
#[test]
fn test_cache_invalidate_all_discards() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.write(0x10, &3i32.to_le_bytes(), &mut mem);
    cache.invalidate_all();

    assert!(!cache.contains(0x10));
    assert_eq!(mem.word(0x10), 0, "voluntary invalidation must not write back");
}

/// Tests single-line invalidation: a dirty line is written back first.
#[test]
fn test_cache_invalidate_line_writes_back() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.write(0x30, &8i32.to_le_bytes(), &mut mem);
    cache.invalidate(0x30, &mut mem);

    assert!(!cache.contains(0x30));
    assert_eq!(mem.word(0x30), 8);
}

/// Tests that FIFO state survives invalidation without duplicating ways.
#[test]
fn test_cache_fifo_after_invalidate() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Fifo);

    cache.read(0x00, 4, &mut mem);
    cache.read(0x40, 4, &mut mem);
    cache.invalidate_all();

    // Refill the set and force two evictions; arrival order must hold.
    cache.read(0x00, 4, &mut mem);
    cache.read(0x40, 4, &mut mem);
    cache.read(0x80, 4, &mut mem);
    assert!(!cache.contains(0x00));
    assert!(cache.contains(0x40));
    assert!(cache.contains(0x80));

    cache.read(0xC0, 4, &mut mem);
    assert!(!cache.contains(0x40));
    assert!(cache.contains(0x80));
    assert!(cache.contains(0xC0));
}

/// Tests that at most one way per set matches a tag.
#[test]
fn test_cache_single_copy_per_set() {
    let (mut cache, mut mem) = small_cache(ReplacementPolicy::Lru);

    cache.read(0x40, 4, &mut mem);
    cache.write(0x40, &1i32.to_le_bytes(), &mut mem);
    cache.read(0x40, 4, &mut mem);

    // Three accesses, one fill: the last two must hit the same way.
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

/// Tests the aligned-word round trip through the hierarchy's L1D.
#[test]
fn test_hierarchy_store_load_round_trip() {
    let mut hierarchy = MemoryHierarchy::new(2, &small_params(), 4096).unwrap();

    hierarchy.store_word(0, 0x100, -31).unwrap();
    let (_, value) = hierarchy.load_word(0, 0x100).unwrap();
    assert_eq!(value, -31);

    // Write-back: memory itself is stale until a flush.
    assert_eq!(hierarchy.memory_word(0x100), 0);
    hierarchy.flush_all().unwrap();
    assert_eq!(hierarchy.memory_word(0x100), -31);
}

/// Tests that flushing one core's L1D makes its writes visible in L2.
#[test]
fn test_hierarchy_flush_l1d_publishes_to_l2() {
    let mut hierarchy = MemoryHierarchy::new(2, &small_params(), 4096).unwrap();

    hierarchy.store_word(0, 0x80, 42).unwrap();
    hierarchy.flush_l1d(0).unwrap();

    let l2_before = hierarchy.l2_stats();
    let (_, value) = hierarchy.load_word(1, 0x80).unwrap();
    assert_eq!(value, 42);

    // Core 1's load missed its own L1D and was served by L2.
    assert_eq!(hierarchy.l1d_stats(1).misses, 1);
    assert_eq!(hierarchy.l2_stats().hits, l2_before.hits + 1);
}

/// Tests that core ids out of range are rejected.
#[test]
fn test_hierarchy_core_id_out_of_range() {
    let mut hierarchy = MemoryHierarchy::new(2, &small_params(), 4096).unwrap();
    assert!(hierarchy.load_word(2, 0).is_err());
    assert!(hierarchy.flush_l1d(5).is_err());
}

/// Tests the scratchpad word round trip and its fatal access checks.
#[test]
fn test_scratchpad_round_trip_and_errors() {
    let mut spm = Scratchpad::new(64, 1);

    spm.store_word(8, 99).unwrap();
    assert_eq!(spm.load_word(8).unwrap(), 99);

    assert!(spm.load_word(6).is_err(), "misaligned access is fatal");
    assert!(spm.store_word(64, 1).is_err(), "out-of-range access is fatal");
}

/// Tests that scratchpad accesses bypass the cache hierarchy.
#[test]
fn test_hierarchy_spm_independent() {
    let mut hierarchy = MemoryHierarchy::new(1, &small_params(), 4096).unwrap();

    hierarchy.store_word_spm(0, 16, 7).unwrap();
    let (latency, value) = hierarchy.load_word_spm(0, 16).unwrap();
    assert_eq!(value, 7);
    assert_eq!(latency, 1);

    assert_eq!(hierarchy.l1d_stats(0).accesses, 0);
    assert_eq!(hierarchy.l2_stats().accesses, 0);
}

/// Tests that out-of-range main memory accesses read zero and drop writes.
#[test]
fn test_main_memory_bounds() {
    let mut mem = MainMemory::new(64, 1);
    mem.write(60, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let (_, data) = mem.read(60, 8);
    assert_eq!(&data[..4], &[1, 2, 3, 4]);
    assert_eq!(&data[4..], &[0, 0, 0, 0]);
}
