//! Blog entities.
//!
//! Users are served from a fixed in-memory table; posts only exist as a
//! data type, there is no route that creates them.

pub mod post;
pub mod user;

pub use post::Post;
pub use user::{users, User};
