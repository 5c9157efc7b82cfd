//! Host-side front ends for the `rui` binary.
#![allow(missing_docs)]

pub mod console;
