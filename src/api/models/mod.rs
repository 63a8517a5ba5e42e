//! Request/response data structures for the REST API.

pub mod payments;
