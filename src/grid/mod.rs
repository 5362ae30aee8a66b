//! Grid value decoding.
//!
//! Samples are first read in file order, whatever the [`Encoding`], then laid
//! out north-up according to the header's [`Sense`](crate::model::Sense).

mod base90;
mod orient;
mod text;

use tracing::debug;

use crate::error::Result;
use crate::model::{Dummy, Encoding, Grid, Header, DEFAULT_DUMMY};

/// Samples in file order.
#[derive(Debug)]
pub(crate) struct RawSamples {
    pub values: Vec<f32>,
    /// A base-90 dummy was seen although the header declares no `#DUMMY`.
    pub implicit_dummy: bool,
}

/// Decodes the data section that follows `#GRID`.
pub fn decode_grid(header: &Header, data: &str, encoding: Encoding) -> Result<Grid> {
    debug!("Decoding {} samples as {:?}", header.cell_count(), encoding);

    let raw = match encoding {
        Encoding::PlainText => text::read_stream(data, header, false)?,
        Encoding::Compressed => text::read_stream(data, header, true)?,
        Encoding::ContinuousLine => text::read_lines(data, header)?,
        Encoding::Base90 { width } => base90::read(data, header, width)?,
    };

    let no_data = match (&header.dummy, raw.implicit_dummy) {
        (Some(dummy), _) => Some(dummy.value as f32),
        (None, true) => Some(DEFAULT_DUMMY as f32),
        (None, false) => None,
    };

    let (width, height) = header.raster_size();
    let values = orient::to_north_up(header, raw.values);

    Ok(Grid {
        width,
        height,
        values,
        no_data,
    })
}

/// Value stored for a dummy cell.
fn dummy_value(dummy: Option<&Dummy>) -> f64 {
    dummy.map(|d| d.value).unwrap_or(DEFAULT_DUMMY)
}
