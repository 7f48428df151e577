//! Hardware backends for the platform traits.
//!
//! Only the interrupt controller and the console are provided here. Image
//! loading, stacks and register contexts depend on the boot environment and
//! are supplied by the embedding kernel binary.

pub mod x86;
