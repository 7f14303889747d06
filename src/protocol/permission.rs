//! # Connection Permission
//!
//! Advisory authorization level attached to a server-side connection.
//!
//! The core never enforces it on send or receive; handlers decide what a
//! permission means for their opcode.

use serde::{Deserialize, Serialize};

/// Authorization level carried by a server-side connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// No rights granted.
    #[default]
    None,
    /// May read application state.
    Read,
    /// May mutate application state.
    Write,
    /// May read and mutate application state.
    ReadWrite,
}
