//! # Quill Shared
//!
//! Request and response types of the Quill HTTP API.
//! Kept free of server dependencies so clients can compile it too.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, PaginatedResponse};
