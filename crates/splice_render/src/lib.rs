pub mod error;
pub mod probe;
pub mod provider;
pub mod render;
pub mod settings;
pub mod thumbnails;

pub use error::RenderError;
pub use provider::FfmpegProvider;
pub use settings::FfmpegSettings;
