mod cors;
mod health;
mod objects;

pub use cors::{method_not_allowed, preflight};
pub use health::health;
pub use objects::{read_object, read_object_at_path, upload_object};
