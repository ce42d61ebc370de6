//! Prelude module - commonly used test utilities.
//!
//! Use `use sigchain_test::prelude::*;` in test modules.

pub use crate::{KmsCall, MockKmsClient};
pub use crate::{
    ed25519_key, fixed_now, hmac_key, registry_with, rsa_key, signed_callback,
    signed_hmac_callback,
};
