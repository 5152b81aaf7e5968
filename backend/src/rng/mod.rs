//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//! Each stochastic node owns exactly one generator, seeded from its config.

mod xorshift;

pub use xorshift::RngManager;
