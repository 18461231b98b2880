//! Data models for Youthnet

mod action;
mod feed;
mod notification;
mod profile;
mod user;

pub use action::*;
pub use feed::*;
pub use notification::*;
pub use profile::*;
pub use user::*;
