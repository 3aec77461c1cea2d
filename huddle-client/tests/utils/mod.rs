pub mod fake_media;
pub mod fake_transport;

pub use fake_media::*;
pub use fake_transport::*;
pub use switchboard::*;
