//! Diagnostic path through the dependency graph.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;

use crate::error::{ResolveError, ResolveResult};

/// Identity of a resolver function: the `TypeId` of its function item or
/// closure type. Two markers wrapping the same function share an identity.
pub type ResolverId = TypeId;

/// The path from a handler down to the dependency currently being resolved.
///
/// The first entry is the handler name, the second the handler parameter,
/// and every further entry a resolver on the way down. Alongside the names the
/// chain tracks which resolvers are active so cycles are caught before they
/// recurse forever.
#[derive(Clone, Default)]
pub struct DependencyChain {
    names: Vec<Cow<'static, str>>,
    active: Vec<ResolverId>,
}

impl DependencyChain {
    /// Starts a chain for one parameter of `handler`.
    pub fn for_parameter(
        handler: impl Into<Cow<'static, str>>,
        parameter: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            names: vec![handler.into(), parameter.into()],
            active: Vec::new(),
        }
    }

    /// Returns a copy with `name` appended.
    pub fn push(&self, name: impl Into<Cow<'static, str>>) -> Self {
        let mut next = self.clone();
        next.names.push(name.into());
        next
    }

    /// Enters resolver `id`, failing if it is already being resolved.
    pub(crate) fn enter(
        &self,
        id: ResolverId,
        name: impl Into<Cow<'static, str>>,
    ) -> ResolveResult<Self> {
        let mut next = self.push(name);
        if self.active.contains(&id) {
            return Err(ResolveError::Cycle {
                handler: self.handler().to_string(),
                parameter: self.parameter().to_string(),
                chain: next.to_vec(),
            });
        }
        next.active.push(id);
        Ok(next)
    }

    pub fn handler(&self) -> &str {
        self.names.first().map_or("<unknown>", |n| &**n)
    }

    pub fn parameter(&self) -> &str {
        self.names.get(1).map_or("<unknown>", |n| &**n)
    }

    /// Whether resolution is inside a resolver function rather than binding
    /// a handler parameter directly.
    pub fn in_resolver(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().map(|n| n.to_string()).collect()
    }

    // ─── Error constructors ───────────────────────────────────────────────────

    pub fn configuration_error(&self, message: impl Into<String>) -> ResolveError {
        ResolveError::Configuration {
            message: message.into(),
            handler: self.handler().to_string(),
            parameter: self.parameter().to_string(),
            chain: self.to_vec(),
        }
    }

    pub fn no_binding(&self, type_name: impl Into<String>) -> ResolveError {
        ResolveError::NoBinding {
            type_name: type_name.into(),
            handler: self.handler().to_string(),
            parameter: self.parameter().to_string(),
            chain: self.to_vec(),
        }
    }

    pub fn resolution_error(&self, source: botty_core::BoxError) -> ResolveError {
        ResolveError::Resolution {
            handler: self.handler().to_string(),
            parameter: self.parameter().to_string(),
            chain: self.to_vec(),
            source,
        }
    }
}

impl fmt::Debug for DependencyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names.iter()).finish()
    }
}

impl fmt::Display for DependencyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// `std::any::type_name` with module paths stripped.
///
/// `alloc::sync::Arc<my_bot::services::Greeter>` becomes `Arc<Greeter>`.
pub fn short_type_name<T: ?Sized>() -> String {
    shorten(std::any::type_name::<T>())
}

fn shorten(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if matches!(c, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';') {
            push_last_segment(&mut out, &full[start..i]);
            out.push(c);
            start = i + c.len_utf8();
        }
    }
    push_last_segment(&mut out, &full[start..]);
    out
}

fn push_last_segment(out: &mut String, path: &str) {
    out.push_str(path.rsplit("::").next().unwrap_or(path));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn test_shorten_nested_paths() {
        assert_eq!(shorten("alloc::sync::Arc<my_bot::Greeter>"), "Arc<Greeter>");
        assert_eq!(
            shorten("core::option::Option<alloc::string::String>"),
            "Option<String>"
        );
        assert_eq!(shorten("(a::B, c::D)"), "(B, D)");
        assert_eq!(short_type_name::<Marker>(), "Marker");
    }

    #[test]
    fn test_chain_display_and_names() {
        let chain = DependencyChain::for_parameter("greet", "Inject<Greeter>").push("make_greeter");
        assert_eq!(chain.handler(), "greet");
        assert_eq!(chain.parameter(), "Inject<Greeter>");
        assert_eq!(chain.to_string(), "greet -> Inject<Greeter> -> make_greeter");
    }

    #[test]
    fn test_enter_detects_cycle() {
        let chain = DependencyChain::for_parameter("h", "p");
        let id = TypeId::of::<Marker>();
        let inner = chain.enter(id, "marker").unwrap();
        let err = inner.enter(id, "marker").unwrap_err();
        assert!(matches!(err, ResolveError::Cycle { .. }));
        assert_eq!(err.chain(), ["h", "p", "marker", "marker"]);
    }

    #[test]
    fn test_in_resolver_after_enter() {
        let chain = DependencyChain::for_parameter("h", "p");
        assert!(!chain.in_resolver());
        let inner = chain.enter(TypeId::of::<Marker>(), "marker").unwrap();
        assert!(inner.push("Answers").in_resolver());
    }
}
