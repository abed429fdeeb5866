//! Adapters implementing collaborator ports for the runtime.

pub mod auth;
