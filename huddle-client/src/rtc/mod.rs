//! Native backend built on webrtc-rs.

mod rtc_media;
mod rtc_transport;

pub use rtc_media::*;
pub use rtc_transport::*;
