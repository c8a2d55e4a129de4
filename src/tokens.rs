//! `${key}` template substitution.
//!
//! Substitution is a single left-to-right pass: replacement text is never
//! re-scanned, keys are taken verbatim, and there is no escape syntax. A
//! `${` without a closing `}` is copied literally.
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::error::PackagerError;

/// Source of values for template tokens.
pub trait TokenResolver {
    /// Value for `key`, or `None` if the key is unknown.
    fn resolve(&self, key: &str) -> Option<String>;
}

impl<R: TokenResolver + ?Sized> TokenResolver for &R {
    fn resolve(&self, key: &str) -> Option<String> {
        (**self).resolve(key)
    }
}

impl<S: BuildHasher> TokenResolver for HashMap<String, String, S> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl TokenResolver for BTreeMap<String, String> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl TokenResolver for [(&str, &str)] {
    fn resolve(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
    }
}

impl<const N: usize> TokenResolver for [(&str, &str); N] {
    fn resolve(&self, key: &str) -> Option<String> {
        self.as_slice().resolve(key)
    }
}

/// Adapts a closure into a [`TokenResolver`].
#[derive(Debug, Clone, Copy)]
pub struct FnResolver<F>(pub F);

impl<F: Fn(&str) -> Option<String>> TokenResolver for FnResolver<F> {
    fn resolve(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }
}

/// Consults `primary` first and `secondary` for anything it does not know.
#[derive(Debug, Clone, Copy)]
pub struct Fallback<A, B> {
    /// Resolver consulted first.
    pub primary: A,
    /// Resolver consulted when `primary` has no value.
    pub secondary: B,
}

impl<A: TokenResolver, B: TokenResolver> TokenResolver for Fallback<A, B> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.primary
            .resolve(key)
            .or_else(|| self.secondary.resolve(key))
    }
}

/// Leaves unknown tokens in the output unchanged.
#[derive(Debug, Clone, Copy)]
pub struct PassThrough<R>(pub R);

impl<R: TokenResolver> TokenResolver for PassThrough<R> {
    fn resolve(&self, key: &str) -> Option<String> {
        Some(self.0.resolve(key).unwrap_or_else(|| format!("${{{key}}}")))
    }
}

/// Replace every `${key}` in `template` with its resolved value.
///
/// # Errors
///
/// Returns [`PackagerError::UnresolvedToken`] for the first key the
/// resolver has no value for.
pub fn substitute<R: TokenResolver + ?Sized>(
    template: &str,
    resolver: &R,
) -> Result<String, PackagerError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let (head, token) = rest.split_at(start);
        out.push_str(head);
        let Some((key, remainder)) = token.get(2..).and_then(|t| t.split_once('}')) else {
            out.push_str(token);
            return Ok(out);
        };
        let value = resolver
            .resolve(key)
            .ok_or_else(|| PackagerError::UnresolvedToken(key.to_string()))?;
        out.push_str(&value);
        rest = remainder;
    }
    out.push_str(rest);
    Ok(out)
}
