//! CLI command implementations.

pub(crate) mod audit;
pub(crate) mod canonicalize;
pub(crate) mod keygen;
pub(crate) mod manifest;
