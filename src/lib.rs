//! Decoder for GXF (Grid eXchange Format) rasters.
//!
//! A GXF file is a keyword header followed by a grid of samples in one of
//! several text encodings. [`open`] and [`decode`] turn it into a
//! [`GxfDataset`]: a north-up `f32` grid with its geotransform, no-data value
//! and spatial reference. [`GeoTiffWriter`] exports the result through GDAL.

pub mod archive;
pub mod checksum;
pub mod config;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod model;
pub mod parser;
pub mod source;
pub mod srs;
pub mod writer;

pub use archive::GxfArchive;
pub use config::DecodeOptions;
pub use dataset::{
    decode, decode_with_options, open, open_with_options, DecodeStage, Decoder, GxfDataset,
    Statistics,
};
pub use error::{GxfError, Result};
pub use model::{Encoding, Grid, Header, Sense};
pub use srs::SpatialReference;
pub use writer::GeoTiffWriter;
