//! Ports for the Admission subsystem.

pub mod outbound;
