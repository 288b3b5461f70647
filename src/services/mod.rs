pub mod imagegen;
pub mod remote;
pub mod textgen;
pub mod upload;

#[cfg(test)]
pub mod mock;

pub use imagegen::{GeneratedImage, HttpImageGenerator, ImageGenerator};
pub use remote::{HttpRemoteStore, RemoteStore};
pub use textgen::{GeneratedText, GenerationKind, HttpTextGenerator, TextGenerator};
pub use upload::{HttpUploadService, UploadService};
