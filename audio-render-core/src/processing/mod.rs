pub mod gain;
pub mod stream_buffer;
