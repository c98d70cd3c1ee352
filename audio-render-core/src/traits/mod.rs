pub mod audio_driver;
pub mod device_resolver;
pub mod enumeration_observer;
pub mod gain_transform;
pub mod render_delegate;
