//! Identity adapters: anonymous sign-in backed by signed session tokens.

pub mod anonymous;

pub use anonymous::{AnonymousAuthProvider, Claims};
