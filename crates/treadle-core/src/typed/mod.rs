//! Typed - task body API.
//!
//! - **Typed surface**: `Handler` with associated `Input`/`Output` types.
//! - **Dyn internals**: `DynHandler`, object safe, JSON in and out.

pub mod handler;

pub use self::handler::{DynHandler, FnHandler, Handler, TypedHandler};
