//! Request extractors that report failures in the API error format.

mod validated_json;

pub use validated_json::{JsonBody, ValidatedJson};
