//! Core data models for the image store.
//!
//! `image` holds the persisted metadata record; `event` holds the invocation
//! event, the response envelope and the JSON bodies the handlers emit.

pub mod event;
pub mod image;
