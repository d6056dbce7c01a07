//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own login normalization, session handling and optimistic
//! mutations so route handlers can stay focused on protocol translation and
//! cookie plumbing.

pub mod auth;
pub mod reconcile;
pub mod session;
pub mod social;
