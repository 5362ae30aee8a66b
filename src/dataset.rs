//! The decode pipeline and the dataset it produces.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::checksum;
use crate::config::DecodeOptions;
use crate::error::{GxfError, Result};
use crate::grid::decode_grid;
use crate::model::{Encoding, Grid, Header, MAX_GTYPE};
use crate::parser::parse_header;
use crate::source::{GxfSource, LineSource};
use crate::srs::{build_spatial_reference, parse_datum_transform, SpatialReference};

/// Where a [`Decoder`] is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Start,
    HeaderParsed,
    GridDecoded,
    /// The reference system was resolved, or left undefined.
    ReferenceResolved,
    Ready,
    Failed,
}

/// Summary statistics over the valid (non-dummy) samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub valid_count: usize,
}

/// A decoded GXF grid. Immutable once built.
#[derive(Debug, Clone)]
pub struct GxfDataset {
    header: Header,
    grid: Grid,
    encoding: Encoding,
    srs: SpatialReference,
}

impl GxfDataset {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Encoding the grid section was read with.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    /// Row-major, north-up samples.
    pub fn values(&self) -> &[f32] {
        &self.grid.values
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.grid.no_data.map(f64::from)
    }

    pub fn title(&self) -> Option<&str> {
        self.header.title.as_deref()
    }

    pub fn geo_transform(&self) -> [f64; 6] {
        self.header.geo_transform()
    }

    pub fn band_checksum(&self) -> u16 {
        checksum::band_checksum(&self.grid)
    }

    pub fn spatial_reference(&self) -> &SpatialReference {
        &self.srs
    }

    /// WKT of the reference system, empty when undefined.
    pub fn spatial_reference_wkt(&self) -> String {
        self.srs.to_wkt()
    }

    /// `None` when every sample is a dummy.
    pub fn statistics(&self) -> Option<Statistics> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count = 0usize;

        for &value in &self.grid.values {
            if self.grid.is_no_data(value) || !value.is_finite() {
                continue;
            }
            let v = f64::from(value);
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        if count == 0 {
            return None;
        }
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Some(Statistics {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            valid_count: count,
        })
    }
}

/// Runs one decode over a [`LineSource`].
///
/// The source is owned by the decoder and dropped as soon as [`Decoder::run`]
/// returns, whatever the outcome.
pub struct Decoder<S> {
    source: Option<S>,
    options: DecodeOptions,
    stage: DecodeStage,
}

impl<S: LineSource> Decoder<S> {
    pub fn new(source: S, options: DecodeOptions) -> Self {
        Self {
            source: Some(source),
            options,
            stage: DecodeStage::Start,
        }
    }

    pub fn stage(&self) -> DecodeStage {
        self.stage
    }

    /// Whether the input stream is still held.
    pub fn holds_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn run(&mut self) -> Result<GxfDataset> {
        let Some(source) = self.source.take() else {
            return Err(GxfError::format("decoder has already run"));
        };
        let result = self.pipeline(source);
        if let Err(e) = &result {
            debug!("Decode failed in stage {:?}: {}", self.stage, e);
            self.stage = DecodeStage::Failed;
        }
        result
    }

    fn pipeline(&mut self, mut source: S) -> Result<GxfDataset> {
        let header = parse_header(&mut source, &self.options)?;
        self.advance(DecodeStage::HeaderParsed);

        let data = source.read_rest()?;
        drop(source);
        let data = String::from_utf8_lossy(&data);

        let encoding = self
            .options
            .encoding
            .unwrap_or_else(|| Encoding::select(&header, &data));
        if let Encoding::Base90 { width } = encoding {
            if !(1..=MAX_GTYPE).contains(&width) {
                return Err(GxfError::format(format!(
                    "base-90 width {} outside 1..={}",
                    width, MAX_GTYPE
                )));
            }
        }
        let grid = decode_grid(&header, &data, encoding)?;
        self.advance(DecodeStage::GridDecoded);

        let srs = match build_spatial_reference(&header.map_projection, header.unit_length.as_ref())
        {
            Ok(srs) => srs,
            Err(e) => {
                warn!("Leaving spatial reference undefined: {}", e);
                SpatialReference::Undefined
            }
        };
        let srs = if header.map_datum_transform.is_empty() || !srs.is_defined() {
            srs
        } else {
            match parse_datum_transform(&header.map_datum_transform) {
                Ok(shift) => srs.with_to_wgs84(shift),
                Err(e) => {
                    warn!("Ignoring #MAP_DATUM_TRANSFORM: {}", e);
                    srs
                }
            }
        };
        self.advance(DecodeStage::ReferenceResolved);

        let dataset = GxfDataset {
            header,
            grid,
            encoding,
            srs,
        };
        self.advance(DecodeStage::Ready);

        info!(
            "Decoded GXF grid {}x{} ({:?}), checksum {}",
            dataset.width(),
            dataset.height(),
            encoding,
            dataset.band_checksum()
        );
        Ok(dataset)
    }

    fn advance(&mut self, stage: DecodeStage) {
        debug!("Decode stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}

/// Decodes a GXF stream with default options.
pub fn decode<R: BufRead>(reader: R) -> Result<GxfDataset> {
    decode_with_options(reader, &DecodeOptions::default())
}

pub fn decode_with_options<R: BufRead>(reader: R, options: &DecodeOptions) -> Result<GxfDataset> {
    Decoder::new(GxfSource::new(reader), options.clone()).run()
}

/// Opens and decodes a GXF file.
pub fn open<P: AsRef<Path>>(path: P) -> Result<GxfDataset> {
    open_with_options(path, &DecodeOptions::default())
}

pub fn open_with_options<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<GxfDataset> {
    let path = path.as_ref();
    debug!("Opening {:?}", path);
    let file = File::open(path)?;
    decode_with_options(BufReader::new(file), options)
}
