pub use executor::Executor;
pub use translate_and_validate::{literal, ExprTranslator, TranslateAndValidate};
mod executor;
mod translate_and_validate;
