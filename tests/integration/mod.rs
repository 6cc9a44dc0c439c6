//! End-to-end scenarios against the music registry

pub mod controls;
pub mod registry;
