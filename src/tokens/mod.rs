//! Token identity: the static registry, on-chain introspection and the resolver on top.

pub mod introspection;
pub mod registry;
pub mod resolver;

pub use introspection::{ChainIntrospector, TokenIntrospector};
pub use registry::{
    ReasonableRange, TokenConfig, TokenRegistry, DEFAULT_UNKNOWN_DECIMALS, UNKNOWN_SYMBOL,
};
pub use resolver::{ResolutionSource, ResolvedToken, TokenResolver};
