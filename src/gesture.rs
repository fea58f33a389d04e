//! Instruction payloads.
//!
//! A gesture is what the server asks a client to perform: a swipe in one of
//! two directions over a distance drawn from the configured range.

pub mod generator;

pub use generator::{Gesture, GestureGenerator};
