//! Shared types used across yunhu-bridge crates: the host message element
//! tree and the session model.

pub mod element;
pub mod session;

pub use {
    element::{ButtonAction, Element, Style, plain_text},
    session::{MemberRole, Message, Session, SessionKind, User},
};
