//! Pure resolution and assertion engine (no IO).
//!
//! Input: a [`scope::ScopeTree`] of already decoded files, built elsewhere.
//! Output: a resolved [`registry::ModuleRegistry`], resolution errors, and the
//! failures produced by rules through the [`assert`] chain.

#![forbid(unsafe_code)]

pub mod assert;
pub mod functions;
pub mod overrides;
pub mod reference;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod sink;
pub mod value;

mod engine;

pub use engine::{CheckFn, EvaluationOptions, Rule, evaluate};
pub use resolve::{Resolution, ResolutionContext, VariableOverrides, resolve};
pub use value::ConfigValue;
