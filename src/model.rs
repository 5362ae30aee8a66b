//! Header and grid types produced by the decoder.

/// Value stored for base-90 dummy cells when the header declares no `#DUMMY`.
pub const DEFAULT_DUMMY: f64 = -1.0e12;

/// Widest base-90 value that still fits a `u64`.
pub const MAX_GTYPE: usize = 9;

/// Scan order of the samples in the file, from `#SENSE`.
///
/// The name gives the corner holding the first sample and the direction in
/// which successive points of one file row advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    /// `+1`
    #[default]
    LowerLeftRight,
    /// `-1`
    LowerLeftUp,
    /// `+2`
    UpperLeftDown,
    /// `-2`
    UpperLeftRight,
    /// `+3`
    UpperRightLeft,
    /// `-3`
    UpperRightDown,
    /// `+4`
    LowerRightUp,
    /// `-4`
    LowerRightLeft,
}

impl Sense {
    pub fn from_code(code: i32) -> Option<Self> {
        let sense = match code {
            1 => Sense::LowerLeftRight,
            -1 => Sense::LowerLeftUp,
            2 => Sense::UpperLeftDown,
            -2 => Sense::UpperLeftRight,
            3 => Sense::UpperRightLeft,
            -3 => Sense::UpperRightDown,
            4 => Sense::LowerRightUp,
            -4 => Sense::LowerRightLeft,
            _ => return None,
        };
        Some(sense)
    }

    pub fn code(&self) -> i32 {
        match self {
            Sense::LowerLeftRight => 1,
            Sense::LowerLeftUp => -1,
            Sense::UpperLeftDown => 2,
            Sense::UpperLeftRight => -2,
            Sense::UpperRightLeft => 3,
            Sense::UpperRightDown => -3,
            Sense::LowerRightUp => 4,
            Sense::LowerRightLeft => -4,
        }
    }

    /// True when the points of a file row run along the x axis.
    pub fn is_horizontal(&self) -> bool {
        matches!(
            self,
            Sense::LowerLeftRight
                | Sense::UpperLeftRight
                | Sense::UpperRightLeft
                | Sense::LowerRightLeft
        )
    }

    /// Raster steps `(dx, dy)` between successive points and successive rows,
    /// with y growing downwards.
    pub(crate) fn steps(&self) -> ((isize, isize), (isize, isize)) {
        match self {
            Sense::LowerLeftRight => ((1, 0), (0, -1)),
            Sense::LowerLeftUp => ((0, -1), (1, 0)),
            Sense::UpperLeftDown => ((0, 1), (1, 0)),
            Sense::UpperLeftRight => ((1, 0), (0, 1)),
            Sense::UpperRightLeft => ((-1, 0), (0, 1)),
            Sense::UpperRightDown => ((0, 1), (-1, 0)),
            Sense::LowerRightUp => ((0, -1), (-1, 0)),
            Sense::LowerRightLeft => ((-1, 0), (0, -1)),
        }
    }
}

/// How the samples after `#GRID` are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Whitespace separated numbers flowing across lines.
    PlainText,
    /// Plain text with `count*value` repeat tokens.
    Compressed,
    /// One file row per logical line, `\` continues a line.
    ContinuousLine,
    /// GXF character compression, `width` characters per value.
    Base90 { width: usize },
}

impl Encoding {
    /// Picks the encoding once, from the header and the raw data section.
    pub fn select(header: &Header, data: &str) -> Self {
        if header.gtype > 0 {
            return Encoding::Base90 {
                width: header.gtype,
            };
        }
        if data.lines().any(|line| line.trim_end().ends_with('\\')) {
            return Encoding::ContinuousLine;
        }
        if data.split_ascii_whitespace().any(|token| token.contains('*')) {
            return Encoding::Compressed;
        }
        Encoding::PlainText
    }
}

/// The `#DUMMY` sentinel, kept both as written and as a number.
#[derive(Debug, Clone, PartialEq)]
pub struct Dummy {
    pub text: String,
    pub value: f64,
}

impl Dummy {
    pub fn matches(&self, token: &str, value: f64) -> bool {
        token == self.text || value == self.value
    }
}

/// Scale and offset from `#TRANSFORM`, applied to base-90 values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueTransform {
    pub scale: f64,
    pub offset: f64,
}

impl Default for ValueTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl ValueTransform {
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }
}

/// Linear unit from `#UNIT_LENGTH`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitLength {
    pub name: String,
    /// Metres per unit.
    pub factor: f64,
}

/// Parsed GXF header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub title: Option<String>,
    /// Samples per file row.
    pub points: usize,
    /// Number of file rows.
    pub rows: usize,
    pub pt_separation: f64,
    pub row_separation: f64,
    pub x_origin: f64,
    pub y_origin: f64,
    /// Degrees, counter-clockwise.
    pub rotation: f64,
    pub sense: Sense,
    pub dummy: Option<Dummy>,
    /// Base-90 width, 0 for text grids.
    pub gtype: usize,
    pub transform: ValueTransform,
    pub ztype: Option<String>,
    pub z_minimum: Option<f64>,
    pub z_maximum: Option<f64>,
    pub map_projection: Vec<String>,
    pub map_datum_transform: Vec<String>,
    pub unit_length: Option<UnitLength>,
}

impl Header {
    pub fn cell_count(&self) -> usize {
        self.rows * self.points
    }

    /// `(width, height)` of the north-up raster.
    pub fn raster_size(&self) -> (usize, usize) {
        if self.sense.is_horizontal() {
            (self.points, self.rows)
        } else {
            (self.rows, self.points)
        }
    }

    /// Pixel size along the raster x and y axes.
    pub fn pixel_size(&self) -> (f64, f64) {
        if self.sense.is_horizontal() {
            (self.pt_separation, self.row_separation)
        } else {
            (self.row_separation, self.pt_separation)
        }
    }

    /// Raster position of the first sample in the file.
    pub(crate) fn first_sample_pixel(&self) -> (usize, usize) {
        let (width, height) = self.raster_size();
        match self.sense {
            Sense::LowerLeftRight | Sense::LowerLeftUp => (0, height - 1),
            Sense::UpperLeftDown | Sense::UpperLeftRight => (0, 0),
            Sense::UpperRightLeft | Sense::UpperRightDown => (width - 1, 0),
            Sense::LowerRightUp | Sense::LowerRightLeft => (width - 1, height - 1),
        }
    }

    /// GDAL-style affine transform of the pixel corners.
    ///
    /// `x = gt[0] + col * gt[1] + row * gt[2]`,
    /// `y = gt[3] + col * gt[4] + row * gt[5]`.
    pub fn geo_transform(&self) -> [f64; 6] {
        let (sx, sy) = self.pixel_size();
        let (x0, y0) = self.first_sample_pixel();
        let (sin, cos) = self.rotation.to_radians().sin_cos();

        // Centre of pixel (0, 0) relative to the first sample, before rotation.
        let local_x = -(x0 as f64) * sx;
        let local_y = y0 as f64 * sy;
        let centre_x = self.x_origin + local_x * cos - local_y * sin;
        let centre_y = self.y_origin + local_x * sin + local_y * cos;

        let gt1 = sx * cos;
        let gt2 = sy * sin;
        let gt4 = sx * sin;
        let gt5 = -sy * cos;

        [
            centre_x - 0.5 * (gt1 + gt2),
            gt1,
            gt2,
            centre_y - 0.5 * (gt4 + gt5),
            gt4,
            gt5,
        ]
    }
}

/// Decoded samples, row-major and north-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub no_data: Option<f32>,
}

impl Grid {
    /// `(rows, cols)` of the raster.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    pub fn is_no_data(&self, value: f32) -> bool {
        self.no_data == Some(value)
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.height {
            return None;
        }
        let start = row * self.width;
        self.values.get(start..start + self.width)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header(points: usize, rows: usize, sense: Sense) -> Header {
        Header {
            title: None,
            points,
            rows,
            pt_separation: 10.0,
            row_separation: 10.0,
            x_origin: 100.0,
            y_origin: 200.0,
            rotation: 0.0,
            sense,
            dummy: None,
            gtype: 0,
            transform: ValueTransform::default(),
            ztype: None,
            z_minimum: None,
            z_maximum: None,
            map_projection: Vec::new(),
            map_datum_transform: Vec::new(),
            unit_length: None,
        }
    }

    #[test]
    fn test_sense_codes_round_trip() {
        for code in [1, -1, 2, -2, 3, -3, 4, -4] {
            assert_eq!(Sense::from_code(code).unwrap().code(), code);
        }
        assert!(Sense::from_code(0).is_none());
        assert!(Sense::from_code(5).is_none());
    }

    #[test]
    fn test_raster_size_follows_sense() {
        assert_eq!(header(3, 2, Sense::LowerLeftRight).raster_size(), (3, 2));
        assert_eq!(header(3, 2, Sense::LowerLeftUp).raster_size(), (2, 3));
    }

    #[test]
    fn test_geo_transform_lower_left_origin() {
        // First sample centre at (100, 200) in the lower-left corner.
        let gt = header(3, 2, Sense::LowerLeftRight).geo_transform();
        assert_eq!(gt, [95.0, 10.0, 0.0, 215.0, 0.0, -10.0]);
    }

    #[test]
    fn test_geo_transform_upper_left_origin() {
        let gt = header(3, 2, Sense::UpperLeftRight).geo_transform();
        assert_eq!(gt, [95.0, 10.0, 0.0, 205.0, 0.0, -10.0]);
    }

    #[test]
    fn test_geo_transform_rotated() {
        let mut h = header(1, 1, Sense::UpperLeftRight);
        h.rotation = 90.0;
        let gt = h.geo_transform();
        assert!(gt[1].abs() < 1e-9);
        assert!((gt[4] - 10.0).abs() < 1e-9);
        assert!((gt[2] - 10.0).abs() < 1e-9);
        assert!(gt[5].abs() < 1e-9);
    }

    #[test]
    fn test_encoding_selection() {
        let mut h = header(2, 2, Sense::default());
        assert_eq!(Encoding::select(&h, "1 2\n3 4\n"), Encoding::PlainText);
        assert_eq!(Encoding::select(&h, "2*1 3 4\n"), Encoding::Compressed);
        assert_eq!(
            Encoding::select(&h, "1 \\\n2\n3 4\n"),
            Encoding::ContinuousLine
        );
        h.gtype = 3;
        assert_eq!(
            Encoding::select(&h, "1 2\n3 4\n"),
            Encoding::Base90 { width: 3 }
        );
    }

    #[test]
    fn test_grid_accessors() {
        let grid = Grid {
            width: 2,
            height: 2,
            values: vec![1.0, 2.0, 3.0, -99.0],
            no_data: Some(-99.0),
        };
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.get(1, 0), Some(3.0));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.row(1), Some(&[3.0, -99.0][..]));
        assert!(grid.is_no_data(-99.0));
        assert!(!grid.is_no_data(0.0));
    }
}
