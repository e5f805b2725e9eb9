//! Common utilities and shared types for fediwire.
//!
//! This crate provides foundational components used across all fediwire crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Cryptography**: RSA key generation for `ActivityPub` signatures
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use fediwire_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;

pub use config::{Config, FederationConfig, ServerConfig};
pub use crypto::{RsaKeypair, generate_rsa_keypair, parse_private_key, parse_public_key};
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, MonotonicIdGenerator};
