//! # reel-core
//!
//! Core types and primitives for the Reel scene exporter.
//! This crate contains foundational types shared across all Reel crates:
//! frame buffers, colors, projective math, frame timing, hashing,
//! configuration and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod math;
pub mod time;

pub use config::*;

pub use color::{Color, ColorError};
pub use error::{ReelError, ReelResult};
pub use frame::FrameBuffer;
pub use math::{Mat3, Mat4, Point2D};
pub use hash::ContentHash;
pub use time::{FrameRate, MICROS_PER_SECOND};
