#![no_std]

extern crate alloc;

// Shared logic for the actuator controller feature set.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and exposing abstractions the other crates can
// adopt. Heap use is limited to serialized status frames (`alloc`).

pub mod command;
pub mod decode;
pub mod input;
pub mod mapping;
pub mod relay;
pub mod report;
