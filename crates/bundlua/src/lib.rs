//! bundlua: bundles a multi-module Lua project into a single `.lua` file.
//!
//! The pipeline is resolver → graph walker → emitter:
//! [`graph_builder::GraphBuilder`] follows every literal `require` from an
//! entry file using a [`resolver::ModuleResolver`], and
//! [`code_generator::emit`] renders the resulting
//! [`bundle_graph::BundleGraph`] behind a small loader that keeps each module
//! isolated and runs it at most once.

pub mod bundle_graph;
pub mod code_generator;
pub mod config;
pub mod dirs;
pub mod error;
pub mod graph_builder;
pub mod lexer;
pub mod metadata;
pub mod module_registry;
pub mod orchestrator;
pub mod output;
pub mod resolver;
pub mod search_path;
pub mod util;
pub mod visitors;
