pub mod json;
pub mod writer;

pub use json::{to_json, to_json_string};
pub use writer::to_edn_string;
