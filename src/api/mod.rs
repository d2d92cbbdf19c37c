//! Host-facing API surface.

pub mod context;
