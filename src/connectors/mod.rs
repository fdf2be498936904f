//! Connector families.
//!
//! `admin_api` covers the cursor-paginated log endpoints; `blob` covers the
//! watermark-enumerated container source.

pub mod admin_api;
pub mod blob;
