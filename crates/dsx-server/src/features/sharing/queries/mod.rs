pub mod media;

pub use media::{PreviewMediaError, PreviewMediaQuery, PreviewMediaResponse};
