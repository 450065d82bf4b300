//! Remote task tracker integration.
//!
//! Lead commits are mirrored to the tracker on a best-effort basis: every
//! call here resolves to an outcome value rather than an error, and an
//! unreachable or unconfigured tracker degrades to `Unavailable` without
//! interrupting the conversation or query flow that triggered it.

pub mod client;
pub mod mapping;

pub use client::{
    NoopTracker, RemoteCreate, RemoteLookup, RemoteTaskRef, RemoteTracker, TrackerClient,
};
