pub mod archive;
pub mod models;

pub use archive::*;
pub use models::*;
