//! Script-facing domain logic: tokenizer, validator and stub generator.

pub mod lexer;
pub mod lua_literal;
pub mod stubs;
pub mod validator;

pub use stubs::{IDEMPOTENCY_ARG, StubBundle, StubGenerator, StubModule};
pub use validator::{MODULE_PREFIX, ScriptValidator, SecurityViolation, ValidatedScript};
