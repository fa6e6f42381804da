pub mod error;
pub mod feature;
pub mod index;
pub mod video;
