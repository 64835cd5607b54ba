// ============================================================================
// Storage Module
// Storage port implementations
// ============================================================================

mod memory;

pub use memory::InMemoryStore;
