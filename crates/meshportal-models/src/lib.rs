#![deny(missing_docs)]

//! # MeshPortal Models
//!
//! Core data types for the MeshPortal multi-tenant portal backend.
//!
//! Every type in this crate is a request-scoped value object: derived
//! fresh for each inbound request and discarded after use. The only
//! process-wide state in the system is the read-only configuration and
//! long-lived HTTP client handles, both of which live in the server crate.
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`tenant`] | Tenant addressing (`OrganizationId`, `TenantIdentity`) |
//! | [`auth`] | Per-request resolved auth configuration (`AuthConfig`) |
//! | [`content`] | Content configurations and service provider responses |
//! | [`context`] | Merged per-request portal context (`RequestContext`) |
//! | [`error`] | Model-level validation and parse errors |

pub mod auth;
pub mod content;
pub mod context;
pub mod error;
pub mod tenant;

// Re-export all public types at crate root for convenience.
// Downstream crates can use `meshportal_models::OrganizationId` directly.
pub use auth::*;
pub use content::*;
pub use context::*;
pub use error::*;
pub use tenant::*;
