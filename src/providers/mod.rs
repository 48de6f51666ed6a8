//! Upstream providers: the call contract, the routing table, and the
//! bundled OpenAI-compatible adapter.

pub mod openai_compat;
pub mod router;
pub mod traits;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRegistration, ProviderRouter, RoutingTable};
pub use traits::ChatProvider;
