mod devices;
mod track;
mod track_controller;

pub use devices::*;
pub use track::*;
pub use track_controller::*;
