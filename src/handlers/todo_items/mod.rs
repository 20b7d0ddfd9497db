pub mod collection;
pub mod item;

use crate::auth::Principal;

// Re-export handler functions for use in routing
pub use collection::get as list;
pub use collection::post as create;
pub use item::put as update;
pub use item::{delete, get};

/// Name stamped into audit columns for the caller
pub(crate) fn actor(principal: &Principal) -> &str {
    principal.name().unwrap_or("unknown")
}
