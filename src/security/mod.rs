//! Cross-context access control.

pub mod guard;
pub mod registry;
pub mod token;

pub use guard::GuardedGlobal;
pub use registry::SecurityTokenRegistry;
pub use token::SecurityToken;
