//! # Vaultify Testkit
//!
//! Testing utilities for Vaultify.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a wired-up in-memory [`TestVault`], a [`ShareFixture`] for
//!   driving tokens and certificates at explicit times, cached key pairs
//! - **Generators**: proptest strategies for plaintexts, token values and
//!   certificate field mutations
//! - **Golden vectors**: fixed inputs with their expected hashes and
//!   canonical payload bytes
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use vaultify_testkit::ShareFixture;
//!
//! async fn example() {
//!     let fixture = ShareFixture::new().await;
//!     let t0 = 1_700_000_000_000;
//!     let (token, cert) = fixture.share(1, t0).await;
//!     let verdict = fixture.verify(&cert, &token.value, t0 + 60_000).await;
//!     assert!(verdict.valid);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vaultify_testkit::generators::{plaintext, SignedField};
//!
//! proptest! {
//!     #[test]
//!     fn mutation_breaks_integrity(field: SignedField, salt: u8) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    fast_config, init_tracing, keypair, other_keypair, ShareFixture, TestVault, TEST_RSA_BITS,
};
