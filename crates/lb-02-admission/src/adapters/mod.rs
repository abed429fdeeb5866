//! Adapters implementing the Admission ports.

pub mod review_log;
