//! Contribution Schemas and Validation
//!
//! This crate decides whether a data-contribution claim is well formed:
//!
//! - **Envelope**: type tag, claim date, witness URI, wallet and account
//! - **Payload**: `securedSharedData`, checked against a per-type schema
//!
//! # Key Components
//!
//! - [`TypeRegistry`]: Maps contribution type tags to [`SchemaDescriptor`]s
//! - [`SchemaProvider`]: Trait for contributing schemas to a registry
//! - [`SchemaValidator`]: Exhaustive validation producing [`ValidatedClaim`]s
//! - [`PayloadValue`]: Normalized payload values (amounts, timestamps, dates)
//!
//! # Example
//!
//! ```ignore
//! use contribution_schema::{SchemaValidator, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::with_builtins());
//! let validator = SchemaValidator::new(registry);
//!
//! match validator.validate_claim(&raw, Utc::now()) {
//!     Ok(claim) => println!("{} accepted", claim.contribution_type),
//!     Err(rejection) => {
//!         for error in &rejection.errors {
//!             println!("{}", error);
//!         }
//!     }
//! }
//! ```

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod registry;
pub mod types;
pub mod validator;
pub mod value;

// Re-export main types
pub use catalog::{tags, BuiltinCatalog, ExtendedCatalog};
pub use descriptor::*;
pub use error::{ClaimRejection, SchemaError, ValidationError};
pub use registry::{SchemaProvider, TypeRegistry};
pub use types::*;
pub use validator::{SchemaValidator, ValidationOptions};
pub use value::*;
