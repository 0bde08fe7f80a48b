//! Response bodies returned by the API.

pub mod errors;
pub mod load;
pub mod metadata;
pub mod upload;

/// Value of the `status` field on successful load and upload responses
pub const STATUS_SUCCESS: &str = "success";
