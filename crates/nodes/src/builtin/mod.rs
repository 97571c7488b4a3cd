//! Simulated behaviour for each node type.
//!
//! Every function here is a pure policy over (config, input); the only
//! side effects live in [`delay`], which waits, and in the randomness the
//! action policies draw from the caller's RNG.

pub mod action;
pub mod condition;
pub mod delay;
pub mod transform;
pub mod trigger;
