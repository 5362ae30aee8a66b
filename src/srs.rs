//! Coordinate reference systems from `#MAP_PROJECTION`.
//!
//! The block holds up to three comma separated lines:
//!
//! 1. the coordinate system name,
//! 2. `datum, major semi-axis, eccentricity, prime meridian`,
//! 3. `method, parameters...` (absent for geographic systems).
//!
//! The result renders to OGC WKT1. Anything that cannot be mapped yields
//! [`GxfError::UnsupportedProjection`]; the decoder treats that as a soft
//! failure and leaves the dataset without a reference.

use crate::error::{GxfError, Result};
use crate::model::UnitLength;
use crate::parser::split_fields;

const DEGREE_TO_RADIAN: &str = "0.0174532925199433";

/// A geographic coordinate system: datum, ellipsoid and prime meridian.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicCs {
    pub name: String,
    pub datum: String,
    pub semi_major: f64,
    pub inverse_flattening: f64,
    pub prime_meridian: f64,
    /// Bursa-Wolf shift to WGS 84 from `#MAP_DATUM_TRANSFORM`:
    /// `dx, dy, dz` in metres, `rx, ry, rz` in arc seconds, scale in ppm.
    pub to_wgs84: Option<[f64; 7]>,
}

/// A projection method and its parameter values, in WKT naming.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub method: &'static str,
    pub parameters: Vec<(&'static str, f64)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SpatialReference {
    #[default]
    Undefined,
    Geographic(GeographicCs),
    Projected {
        name: String,
        geographic: GeographicCs,
        projection: Projection,
        unit: UnitLength,
    },
}

impl SpatialReference {
    pub fn is_defined(&self) -> bool {
        !matches!(self, SpatialReference::Undefined)
    }

    /// WKT1 text, empty when undefined.
    pub fn to_wkt(&self) -> String {
        match self {
            SpatialReference::Undefined => String::new(),
            SpatialReference::Geographic(geog) => geogcs_wkt(geog),
            SpatialReference::Projected {
                name,
                geographic,
                projection,
                unit,
            } => {
                let parameters: String = projection
                    .parameters
                    .iter()
                    .map(|(param, value)| format!(",PARAMETER[\"{}\",{}]", param, value))
                    .collect();
                format!(
                    "PROJCS[\"{}\",{},PROJECTION[\"{}\"]{},UNIT[\"{}\",{}]]",
                    name,
                    geogcs_wkt(geographic),
                    projection.method,
                    parameters,
                    unit.name,
                    unit.factor
                )
            }
        }
    }
}

fn geogcs_wkt(geog: &GeographicCs) -> String {
    let towgs84 = geog
        .to_wgs84
        .map(|shift| {
            let values: Vec<String> = shift.iter().map(f64::to_string).collect();
            format!(",TOWGS84[{}]", values.join(","))
        })
        .unwrap_or_default();
    format!(
        "GEOGCS[\"{}\",DATUM[\"{}\",SPHEROID[\"{}\",{},{}]{}],PRIMEM[\"unnamed\",{}],UNIT[\"degree\",{}]]",
        geog.name,
        geog.datum,
        geog.datum,
        geog.semi_major,
        geog.inverse_flattening,
        towgs84,
        geog.prime_meridian,
        DEGREE_TO_RADIAN
    )
}

/// Parameter names of each supported method, in GXF order.
fn method_parameters(method: &str) -> Option<(&'static str, &'static [&'static str])> {
    const TM_LIKE: &[&str] = &[
        "latitude_of_origin",
        "central_meridian",
        "scale_factor",
        "false_easting",
        "false_northing",
    ];

    let normalized = method
        .trim_start_matches('*')
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let entry: (&'static str, &'static [&'static str]) = match normalized.as_str() {
        "lambert conic conformal (1sp)" => ("Lambert_Conformal_Conic_1SP", TM_LIKE),
        "lambert conic conformal (2sp)" => (
            "Lambert_Conformal_Conic_2SP",
            &[
                "standard_parallel_1",
                "standard_parallel_2",
                "latitude_of_origin",
                "central_meridian",
                "false_easting",
                "false_northing",
            ],
        ),
        "transverse mercator" => ("Transverse_Mercator", TM_LIKE),
        "mercator (1sp)" => ("Mercator_1SP", TM_LIKE),
        "oblique stereographic" => ("Oblique_Stereographic", TM_LIKE),
        "polar stereographic" => ("Polar_Stereographic", TM_LIKE),
        "albers conic" => (
            "Albers_Conic_Equal_Area",
            &[
                "standard_parallel_1",
                "standard_parallel_2",
                "latitude_of_center",
                "longitude_of_center",
                "false_easting",
                "false_northing",
            ],
        ),
        _ => return None,
    };
    Some(entry)
}

/// Builds a reference from the `#MAP_PROJECTION` lines and `#UNIT_LENGTH`.
///
/// No projection lines at all gives [`SpatialReference::Undefined`].
pub fn build_spatial_reference(
    map_projection: &[String],
    unit_length: Option<&UnitLength>,
) -> Result<SpatialReference> {
    if map_projection.is_empty() {
        return Ok(SpatialReference::Undefined);
    }

    let lines: Vec<Vec<String>> = map_projection.iter().map(|l| split_fields(l)).collect();

    let name = lines[0].first().cloned().unwrap_or_default();
    let datum_fields = lines
        .get(1)
        .ok_or_else(|| unsupported("missing datum line"))?;
    let geographic = parse_datum(&name, datum_fields)?;

    let method_fields = match lines.get(2) {
        Some(fields) if !fields.is_empty() && !fields[0].is_empty() => fields,
        _ => return Ok(SpatialReference::Geographic(geographic)),
    };

    let method = method_fields[0].as_str();
    if method.eq_ignore_ascii_case("geographic") {
        return Ok(SpatialReference::Geographic(geographic));
    }

    let (wkt_method, names) =
        method_parameters(method).ok_or_else(|| unsupported(format!("method {:?}", method)))?;

    let values = &method_fields[1..];
    if values.len() < names.len() {
        return Err(unsupported(format!(
            "{} needs {} parameters, found {}",
            method,
            names.len(),
            values.len()
        )));
    }

    let parameters = names
        .iter()
        .zip(values)
        .map(|(&param, text)| {
            text.parse::<f64>()
                .map(|v| (param, v))
                .map_err(|_| unsupported(format!("{} is not numeric: {:?}", param, text)))
        })
        .collect::<Result<Vec<_>>>()?;

    let unit = unit_length.cloned().unwrap_or(UnitLength {
        name: "metre".to_string(),
        factor: 1.0,
    });

    let name = if name.is_empty() {
        format!("{} / {}", geographic.datum, wkt_method)
    } else {
        name
    };

    Ok(SpatialReference::Projected {
        name,
        geographic: GeographicCs {
            name: geographic.datum.clone(),
            ..geographic
        },
        projection: Projection {
            method: wkt_method,
            parameters,
        },
        unit,
    })
}

fn parse_datum(name: &str, fields: &[String]) -> Result<GeographicCs> {
    let datum = fields
        .first()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| unsupported("empty datum name"))?
        .clone();

    let number = |idx: usize, what: &str| -> Result<f64> {
        fields
            .get(idx)
            .and_then(|f| f.parse::<f64>().ok())
            .ok_or_else(|| unsupported(format!("datum {} is missing or not numeric", what)))
    };

    let semi_major = number(1, "major semi-axis")?;
    let eccentricity = number(2, "eccentricity")?;
    let prime_meridian = fields
        .get(3)
        .and_then(|f| f.parse::<f64>().ok())
        .unwrap_or(0.0);

    if semi_major <= 0.0 || !(0.0..1.0).contains(&eccentricity) {
        return Err(unsupported(format!(
            "ellipsoid a={} e={} out of range",
            semi_major, eccentricity
        )));
    }

    Ok(GeographicCs {
        name: if name.is_empty() {
            datum.clone()
        } else {
            name.to_string()
        },
        datum,
        semi_major,
        inverse_flattening: inverse_flattening(eccentricity),
        prime_meridian,
        to_wgs84: None,
    })
}

/// `1 / f` from the first eccentricity, 0 for a sphere.
pub fn inverse_flattening(eccentricity: f64) -> f64 {
    if eccentricity == 0.0 {
        return 0.0;
    }
    1.0 / (1.0 - (1.0 - eccentricity * eccentricity).sqrt())
}

/// Reads `datum, dx, dy, dz[, rx, ry, rz, scale]` from the first
/// `#MAP_DATUM_TRANSFORM` line.
pub fn parse_datum_transform(lines: &[String]) -> Result<[f64; 7]> {
    let fields = lines
        .first()
        .map(|l| split_fields(l))
        .ok_or_else(|| unsupported("empty datum transform"))?;

    let values = fields
        .iter()
        .skip(1)
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.parse::<f64>()
                .map_err(|_| unsupported(format!("datum shift is not numeric: {:?}", f)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut shift = [0.0; 7];
    match values.len() {
        3 | 7 => shift[..values.len()].copy_from_slice(&values),
        n => {
            return Err(unsupported(format!(
                "datum transform needs 3 or 7 values, found {}",
                n
            )))
        }
    }
    Ok(shift)
}

impl SpatialReference {
    /// Attaches a WGS 84 shift to the datum. Undefined references are
    /// returned unchanged.
    pub fn with_to_wgs84(self, shift: [f64; 7]) -> Self {
        match self {
            SpatialReference::Undefined => SpatialReference::Undefined,
            SpatialReference::Geographic(geog) => SpatialReference::Geographic(GeographicCs {
                to_wgs84: Some(shift),
                ..geog
            }),
            SpatialReference::Projected {
                name,
                geographic,
                projection,
                unit,
            } => SpatialReference::Projected {
                name,
                geographic: GeographicCs {
                    to_wgs84: Some(shift),
                    ..geographic
                },
                projection,
                unit,
            },
        }
    }
}

fn unsupported(msg: impl Into<String>) -> GxfError {
    GxfError::UnsupportedProjection(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    fn ohio_north() -> Vec<String> {
        lines(&[
            "\"NAD27 / Ohio North\"",
            "\"NAD27\",6378206.4,0.0822718542230039,0",
            "\"Lambert Conic Conformal (2SP)\",40.4333333333,41.7,39.6666666667,82.5,609601.22,0",
        ])
    }

    #[test]
    fn test_lambert_2sp_with_us_feet() {
        let unit = UnitLength {
            name: "ftUS".to_string(),
            factor: 0.3048006096012,
        };
        let srs = build_spatial_reference(&ohio_north(), Some(&unit)).unwrap();
        let wkt = srs.to_wkt();

        assert!(wkt.starts_with("PROJCS[\"NAD27 / Ohio North\",GEOGCS[\"NAD27\",DATUM[\"NAD27\",SPHEROID[\"NAD27\",6378206.4,294.97869"));
        assert!(wkt.contains("PROJECTION[\"Lambert_Conformal_Conic_2SP\"]"));
        assert!(wkt.contains("PARAMETER[\"standard_parallel_1\",40.4333333333]"));
        assert!(wkt.contains("PARAMETER[\"standard_parallel_2\",41.7]"));
        assert!(wkt.contains("PARAMETER[\"latitude_of_origin\",39.6666666667]"));
        assert!(wkt.contains("PARAMETER[\"central_meridian\",82.5]"));
        assert!(wkt.contains("PARAMETER[\"false_easting\",609601.22]"));
        assert!(wkt.contains("PARAMETER[\"false_northing\",0]"));
        assert!(wkt.ends_with("UNIT[\"ftUS\",0.3048006096012]]"));
    }

    #[test]
    fn test_default_unit_is_metre() {
        let srs = build_spatial_reference(&ohio_north(), None).unwrap();
        assert!(srs.to_wkt().ends_with("UNIT[\"metre\",1]]"));
    }

    #[test]
    fn test_geographic() {
        let srs = build_spatial_reference(
            &lines(&["\"WGS 84\"", "\"WGS84\",6378137,0.0818191908426,0"]),
            None,
        )
        .unwrap();
        let wkt = srs.to_wkt();
        assert!(wkt.starts_with("GEOGCS[\"WGS 84\",DATUM[\"WGS84\",SPHEROID[\"WGS84\",6378137,298.25"));
        assert!(wkt.ends_with("UNIT[\"degree\",0.0174532925199433]]"));
        assert!(!wkt.contains("PROJCS"));

        let explicit = build_spatial_reference(
            &lines(&["\"WGS 84\"", "\"WGS84\",6378137,0.0818191908426,0", "\"Geographic\""]),
            None,
        )
        .unwrap();
        assert_eq!(srs, explicit);
    }

    #[test]
    fn test_transverse_mercator() {
        let srs = build_spatial_reference(
            &lines(&[
                "\"UTM 17N\"",
                "\"NAD83\",6378137,0.0818191910428,0",
                "\"Transverse Mercator\",0,-81,0.9996,500000,0",
            ]),
            None,
        )
        .unwrap();
        let wkt = srs.to_wkt();
        assert!(wkt.contains("PROJECTION[\"Transverse_Mercator\"]"));
        assert!(wkt.contains("PARAMETER[\"central_meridian\",-81]"));
        assert!(wkt.contains("PARAMETER[\"scale_factor\",0.9996]"));
    }

    #[test]
    fn test_no_projection_is_undefined() {
        let srs = build_spatial_reference(&[], None).unwrap();
        assert!(!srs.is_defined());
        assert_eq!(srs.to_wkt(), "");
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let err = build_spatial_reference(
            &lines(&["\"x\"", "\"NAD27\",6378206.4,0.08,0", "\"Bonne\",1,2"]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GxfError::UnsupportedProjection(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_parameters_are_unsupported() {
        let err = build_spatial_reference(
            &lines(&[
                "\"x\"",
                "\"NAD27\",6378206.4,0.08,0",
                "\"Lambert Conic Conformal (2SP)\",40.4,41.7",
            ]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GxfError::UnsupportedProjection(_)));
    }

    #[test]
    fn test_bad_datum_is_unsupported() {
        for datum in ["\"NAD27\"", "\"NAD27\",big,0.08", "\"\",6378206.4,0.08"] {
            let err = build_spatial_reference(&lines(&["\"x\"", datum]), None).unwrap_err();
            assert!(matches!(err, GxfError::UnsupportedProjection(_)));
        }
        let err = build_spatial_reference(&lines(&["\"x\""]), None).unwrap_err();
        assert!(matches!(err, GxfError::UnsupportedProjection(_)));
    }

    #[test]
    fn test_datum_transform_adds_towgs84() {
        let shift = parse_datum_transform(&lines(&["\"NAD27 to WGS 84\",-8,160,176"])).unwrap();
        assert_eq!(shift, [-8.0, 160.0, 176.0, 0.0, 0.0, 0.0, 0.0]);

        let srs = build_spatial_reference(&ohio_north(), None)
            .unwrap()
            .with_to_wgs84(shift);
        let wkt = srs.to_wkt();
        assert!(wkt.contains("294.9786982139006],TOWGS84[-8,160,176,0,0,0,0]],PRIMEM"));
        assert!(wkt.starts_with("PROJCS[\"NAD27 / Ohio North\""));
    }

    #[test]
    fn test_seven_parameter_datum_transform() {
        let shift = parse_datum_transform(&lines(&[
            "\"ED50 to WGS 84\",-87,-98,-121,0.1,0.2,0.3,1.5",
        ]))
        .unwrap();
        assert_eq!(shift, [-87.0, -98.0, -121.0, 0.1, 0.2, 0.3, 1.5]);
    }

    #[test]
    fn test_bad_datum_transform_is_unsupported() {
        for line in ["\"x\",1,2", "\"x\",1,2,abc"] {
            let err = parse_datum_transform(&lines(&[line])).unwrap_err();
            assert!(matches!(err, GxfError::UnsupportedProjection(_)));
        }
        assert!(parse_datum_transform(&[]).is_err());
    }

    #[test]
    fn test_undefined_ignores_datum_transform() {
        let srs = SpatialReference::Undefined.with_to_wgs84([1.0; 7]);
        assert_eq!(srs.to_wkt(), "");
    }

    #[test]
    fn test_inverse_flattening() {
        assert_eq!(inverse_flattening(0.0), 0.0);
        let clarke_1866 = inverse_flattening(0.0822718542230039);
        assert!((clarke_1866 - 294.9786982).abs() < 1e-6);
    }
}
