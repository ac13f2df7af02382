#[cfg(feature = "opencv")]
pub mod capture;
pub mod downscale;
pub mod export;
pub mod image_io;
pub mod inlet;
pub mod output;
pub mod reference;
pub mod ser;
pub mod ser_writer;
pub mod sliced;
pub mod source;
