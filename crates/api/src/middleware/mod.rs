//! Request extractors shared by the routes.

pub mod tenant;

pub use tenant::TenantContext;
