pub mod volume;

pub use volume::WindowsVolume;
