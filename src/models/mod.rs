//! All the document models live here.

pub use friend::*;
pub use group::*;
pub use user::*;

mod friend;
mod group;
mod user;
