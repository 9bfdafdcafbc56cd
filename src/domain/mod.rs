//! Domain layer - pure business logic with no I/O.
//!
//! This layer contains the core concepts and invariants of the send guard:
//! - Scene policies and their validation
//! - Parameter whitelisting
//! - Request fingerprints for duplicate suppression
//! - The closed error taxonomy and provider code classification
//! - Address masking for diagnostics
//!
//! All types in this layer are pure and easily testable.

pub mod error;
pub mod fingerprint;
pub mod masking;
pub mod params;
pub mod provider_error;
pub mod scene;
pub mod verification;
