//! Pure domain logic for the fleetdoc protocol pipeline.
//!
//! Everything in this crate operates on in-memory buffers and plain
//! data; storage, database, and queue concerns live in the sibling
//! crates. Keeping this layer I/O-free is what makes the hashing,
//! imaging, and PDF logic unit-testable without infrastructure.

pub mod error;
pub mod hashing;
pub mod imaging;
pub mod manifest;
pub mod pdf;
pub mod types;
