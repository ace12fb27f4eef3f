//! Code generation for bundling Lua modules into a single file
//!
//! The generated bundle:
//! - Opens with a small loader that owns a private module table
//! - Registers every module as a function body, in load order, without running it
//! - Runs a module body on its first `require` and memoizes the result
//! - Finishes by requiring the entry module and returning its result

pub mod bundler;
pub mod module_wrapper;
pub mod runtime;

// Re-export the main bundler and key types
pub use bundler::{BundleOutput, EmitOptions, EmittedModule, emit};
