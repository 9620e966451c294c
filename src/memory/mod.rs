//! Memory for the opaque native object.
//!
//! The binding never learns the full layout of the platform's
//! `GraphicBuffer`. It reserves a versioned, fixed-capacity arena, lets the
//! native constructor initialize it in place, and only reads the documented
//! prefix of the native window buffer the object hands back.
//!
//! - [`ObjectArena`]: page-backed storage with guard bytes
//! - [`NativeObject`]: constructed object, destroyed on drop

mod arena;
mod object;

pub use arena::ObjectArena;
pub use object::NativeObject;
