//! Require discovery over a module's token stream.
//!
//! A call to the global `require` is classified by its first argument: a lone
//! string literal is a static dependency the walker can follow, anything else
//! is computed at runtime and can only be reported.

use std::fmt;

use crate::{
    error::{BundleError, BundleResult},
    lexer::{Punct, SourceLocation, Token, TokenKind, tokenize},
};

const REQUIRE: &str = "require";

/// A `require` call site found in a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequireReference {
    /// `require "name"` or `require("name")`
    Literal {
        name: String,
        location: SourceLocation,
    },
    /// `require(expr)` where `expr` is not a constant string
    Dynamic { location: Option<SourceLocation> },
}

/// Non-fatal report of a `require` whose target cannot be known statically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicReference {
    /// Canonical name of the module containing the call
    pub module: String,
    /// Start of the argument expression, when there is one
    pub location: Option<SourceLocation>,
}

impl fmt::Display for DynamicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(
                f,
                "Non-literal require found in '{}' at {}",
                self.module, location
            ),
            None => write!(
                f,
                "Non-literal require found in '{}' at unknown location",
                self.module
            ),
        }
    }
}

/// Tokenize `source` and collect its `require` call sites in source order
pub fn discover_requires(module_name: &str, source: &str) -> BundleResult<Vec<RequireReference>> {
    let tokens = tokenize(source).map_err(|err| BundleError::Syntax {
        module: module_name.to_string(),
        location: err.location,
        message: err.message,
    })?;

    let mut visitor = RequireDiscoveryVisitor::new();
    visitor.visit_tokens(&tokens);
    log::trace!(
        "Found {} require call(s) in '{module_name}'",
        visitor.references.len()
    );
    Ok(visitor.into_references())
}

/// Visitor that walks a token stream and records every `require` call
#[derive(Debug, Default)]
pub struct RequireDiscoveryVisitor {
    references: Vec<RequireReference>,
}

impl RequireDiscoveryVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit_tokens(&mut self, tokens: &[Token]) {
        for (index, token) in tokens.iter().enumerate() {
            if !token.is_name(REQUIRE) || !is_global_reference(tokens, index) {
                continue;
            }
            if let Some(reference) = classify_call(&tokens[index + 1..]) {
                self.references.push(reference);
            }
        }
    }

    pub fn into_references(self) -> Vec<RequireReference> {
        self.references
    }
}

/// `require` is a global call target unless it is a field (`t.require`), a
/// method (`obj:require`), or the name of a function being defined
fn is_global_reference(tokens: &[Token], index: usize) -> bool {
    let Some(previous) = index.checked_sub(1).and_then(|i| tokens.get(i)) else {
        return true;
    };
    !(previous.is_punct(Punct::Dot)
        || previous.is_punct(Punct::Colon)
        || previous.is_name("function"))
}

/// Classify the call whose argument tokens start at `rest[0]`
fn classify_call(rest: &[Token]) -> Option<RequireReference> {
    let next = rest.first()?;
    match &next.kind {
        TokenKind::String(name) => Some(RequireReference::Literal {
            name: name.clone(),
            location: next.location,
        }),
        TokenKind::Punct(Punct::LBrace) => Some(RequireReference::Dynamic {
            location: Some(next.location),
        }),
        TokenKind::Punct(Punct::LParen) => Some(classify_arguments(&rest[1..])),
        _ => None,
    }
}

fn classify_arguments(arguments: &[Token]) -> RequireReference {
    let Some(first) = arguments.first() else {
        return RequireReference::Dynamic { location: None };
    };

    if first.is_punct(Punct::RParen) {
        return RequireReference::Dynamic { location: None };
    }

    if let TokenKind::String(name) = &first.kind {
        let ends_argument = arguments
            .get(1)
            .is_some_and(|t| t.is_punct(Punct::RParen) || t.is_punct(Punct::Comma));
        if ends_argument {
            return RequireReference::Literal {
                name: name.clone(),
                location: first.location,
            };
        }
    }

    RequireReference::Dynamic {
        location: Some(first.location),
    }
}
