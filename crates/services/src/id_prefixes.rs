//! ID prefix constants for resource identifiers.
//!
//! These prefixes are used to create human-readable IDs that follow
//! our naming conventions.

/// Prefix for server-generated message IDs
pub const PREFIX_MSG: &str = "msg-";

/// Prefix for tool call IDs minted when the model omits one
pub const PREFIX_CALL: &str = "call_";

/// Prefix for generated file object keys
pub const PREFIX_FILE: &str = "file-";

/// Length of the random part of a message ID
pub const MESSAGE_ID_SIZE: usize = 16;

/// All known ID prefixes
pub const ALL_PREFIXES: &[&str] = &[PREFIX_MSG, PREFIX_CALL, PREFIX_FILE];
