pub mod volume;

pub use volume::UnixVolume;
