use crate::model::Encoding;

/// Upper bound on `rows * points` accepted by default (1 GiB of `f32`).
pub const DEFAULT_MAX_CELLS: usize = 1 << 28;

/// Knobs for a single decode.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Forces an encoding instead of detecting it from the data.
    pub encoding: Option<Encoding>,
    /// Fail when `#PTSEPARATION` or `#ROWSEPARATION` is missing.
    /// When unset, missing separations default to 1.
    pub require_geometry: bool,
    pub max_cells: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            require_geometry: true,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl DecodeOptions {
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn lenient_geometry(mut self) -> Self {
        self.require_geometry = false;
        self
    }
}
