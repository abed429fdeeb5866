//! Adapters implementing the Score Mutator ports.

pub mod memory_store;
