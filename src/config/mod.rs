mod constraints;
mod schema;

pub use constraints::MediaConstraints;
pub use schema::*;
