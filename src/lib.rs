//! FormKit Core - Client-Side Form Validation Engine
//!
//! # The Ground Rules (Non-Negotiable)
//! 1. The Schema Is Declared Once
//! 2. Validators Are Pure
//! 3. Every Change Re-Evaluates
//! 4. Errors Are Codes, Messages Are Display
//! 5. Pristine Fields Stay Quiet
//! 6. Structural Misuse Fails Loudly

pub mod engine;
pub mod messages;
pub mod schema;
pub mod validators;
pub mod watch;

pub use engine::{DisplayState, EngineError, FormEngine};
pub use messages::MessageCatalog;
pub use schema::{
    FieldSpec, GroupSpec, GroupValidatorSpec, Schema, SchemaNode, SurfacePolicy, ValidatorSpec,
};
pub use validators::{codes, ErrorSet, GroupValidator, GroupView, Validator};
pub use watch::{WatchEvent, DEFAULT_DEBOUNCE};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
