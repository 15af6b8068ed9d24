//! Cover variants in pure Rust.
//!
//! The browser writes one large cover per post; this module derives the
//! thumbnail and medium copies from it by filling the target size with
//! Lanczos3 and cropping the overflow evenly, optionally followed by an
//! unsharp mask.
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a resize
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Variant naming and planning on top of the backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use operations::{VariantSpec, create_variant, plan_variant, variant_path};
pub use params::{ResizeParams, Sharpening};
pub use rust_backend::RustBackend;
