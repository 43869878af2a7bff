//! Handler parameter binding.
//!
//! The handler macros call [`resolve_parameter`] once per declared parameter,
//! in declaration order, before the handler body runs. Every parameter gets a
//! fresh chain `[handler, parameter]`; nested dependencies extend it.

use tracing::{debug, trace};

use super::chain::{DependencyChain, short_type_name};
use super::extract::FromScope;
use super::scope::RequestScope;
use crate::error::ResolveResult;

/// Binds one parameter of `handler`.
///
/// The parameter is named after its type, since Rust keeps no parameter names
/// at runtime.
pub async fn resolve_parameter<P: FromScope>(scope: &RequestScope, handler: &str) -> ResolveResult<P> {
    let chain = DependencyChain::for_parameter(handler.to_string(), short_type_name::<P>());
    trace!(handler, parameter = chain.parameter(), "Resolving parameter");

    match P::from_scope(scope, &chain).await {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!(handler, parameter = chain.parameter(), error = %e, "Parameter resolution failed");
            Err(e)
        }
    }
}
