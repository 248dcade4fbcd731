//! Transaction Module
//!
//! Chain-state lookups, the delegated relay pipeline and broadcasting.

mod broadcaster;
mod provider;
mod relay;

pub use broadcaster::*;
pub use provider::*;
pub use relay::*;
