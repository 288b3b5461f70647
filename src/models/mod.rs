pub mod entry;
pub mod patch;
pub mod session;
pub mod settings;
pub mod tags;
pub mod upload;

pub use entry::*;
pub use patch::*;
pub use session::*;
pub use settings::*;
pub use tags::*;
pub use upload::*;
