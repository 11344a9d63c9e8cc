//! Request data models.
//!
//! Requests are parsed into these types once, at the HTTP boundary, and
//! never handled as raw JSON afterwards.

pub mod action;

pub use action::{Action, CommentRequest, FileUpload, SubjectInfo, SUPPORTED_ACTIONS};
