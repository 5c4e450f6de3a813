//! Terminal dashboard
//!
//! The presenter owns the surface and the render loop; the key listener runs
//! on its own thread. They share nothing but two bounded inboxes and the
//! cancellation token.

pub mod input;
pub mod layout;
pub mod presenter;
pub mod surface;
pub mod terminal;

pub use input::{spawn_key_listener, KeyCommand};
pub use presenter::{Presenter, ScrollPosition};
pub use surface::Surface;
pub use terminal::TerminalSurface;
