//! Ports for the Score Mutator subsystem.

pub mod outbound;
