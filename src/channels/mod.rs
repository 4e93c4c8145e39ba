//! Chat platform bindings.
//!
//! Thin transport on top of the orchestrator: collects a photo and a
//! product/color/print selection, then hands a [`crate::providers::TryOnJob`]
//! to the core and renders the outcome. No quota or locking logic lives here.

pub mod telegram;
