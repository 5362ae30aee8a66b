//! GXF header parsing.
//!
//! The header is a sequence of `#KEYWORD` lines, each followed by zero or more
//! value lines, terminated by `#GRID`. Keywords are matched case-insensitively;
//! anything unrecognised is skipped.

use tracing::{debug, warn};

use crate::config::DecodeOptions;
use crate::error::{GxfError, Result};
use crate::model::{Dummy, Header, Sense, UnitLength, ValueTransform, MAX_GTYPE};
use crate::source::LineSource;

/// Reads header keywords from `source` up to and including `#GRID`.
///
/// On success the source is positioned on the first grid line.
pub fn parse_header<S: LineSource>(source: &mut S, options: &DecodeOptions) -> Result<Header> {
    let mut builder = HeaderBuilder::default();
    let mut current: Option<(String, Vec<String>, usize)> = None;

    while let Some(line) = source.next_line()? {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix('#') {
            if let Some((keyword, values, line_number)) = current.take() {
                builder
                    .apply(&keyword, &values)
                    .map_err(|e| at_line(e, line_number))?;
            }

            let rest = rest.trim_start();
            let (keyword, inline) = match rest.find(char::is_whitespace) {
                Some(idx) => (&rest[..idx], rest[idx..].trim()),
                None => (rest, ""),
            };
            let keyword = keyword.to_ascii_uppercase();

            if keyword == "GRID" {
                debug!("Reached #GRID, header complete");
                return builder.finish(options);
            }

            let mut values = Vec::new();
            if !inline.is_empty() {
                values.push(inline.to_string());
            }
            current = Some((keyword, values, source.line_number()));
        } else if let Some((_, values, _)) = current.as_mut() {
            if !trimmed.is_empty() {
                values.push(trimmed.to_string());
            }
        }
    }

    Err(GxfError::format("end of stream before #GRID"))
}

fn at_line(err: GxfError, line_number: usize) -> GxfError {
    match err {
        GxfError::Format(msg) => GxfError::Format(format!("line {}: {}", line_number, msg)),
        other => other,
    }
}

/// Splits a value line on commas outside double quotes and strips the quotes.
pub(crate) fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

#[derive(Default)]
struct HeaderBuilder {
    title: Option<String>,
    points: Option<usize>,
    rows: Option<usize>,
    pt_separation: Option<f64>,
    row_separation: Option<f64>,
    x_origin: Option<f64>,
    y_origin: Option<f64>,
    rotation: Option<f64>,
    sense: Option<Sense>,
    dummy: Option<Dummy>,
    gtype: Option<usize>,
    transform: Option<ValueTransform>,
    ztype: Option<String>,
    z_minimum: Option<f64>,
    z_maximum: Option<f64>,
    map_projection: Vec<String>,
    map_datum_transform: Vec<String>,
    unit_length: Option<UnitLength>,
}

impl HeaderBuilder {
    fn apply(&mut self, keyword: &str, values: &[String]) -> Result<()> {
        debug!("Header keyword #{} ({} value lines)", keyword, values.len());
        match keyword {
            "TITLE" => {
                let title = values
                    .iter()
                    .map(|line| split_fields(line).join(", "))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.title = Some(title);
            }
            "POINTS" | "COLS" => self.points = Some(count(keyword, values)?),
            "ROWS" => self.rows = Some(count(keyword, values)?),
            "PTSEPARATION" => self.pt_separation = Some(separation(keyword, values)?),
            "ROWSEPARATION" => self.row_separation = Some(separation(keyword, values)?),
            "XORIGIN" => self.x_origin = Some(number(keyword, values)?),
            "YORIGIN" => self.y_origin = Some(number(keyword, values)?),
            "ROTATION" => self.rotation = Some(number(keyword, values)?),
            "SENSE" => {
                let code = integer(keyword, values)?;
                let sense = i32::try_from(code)
                    .ok()
                    .and_then(Sense::from_code)
                    .ok_or_else(|| GxfError::format(format!("invalid #SENSE {}", code)))?;
                self.sense = Some(sense);
            }
            "DUMMY" => {
                let text = first_token(keyword, values)?;
                let value = text
                    .parse::<f64>()
                    .map_err(|_| GxfError::format(format!("#DUMMY is not numeric: {:?}", text)))?;
                self.dummy = Some(Dummy { text, value });
            }
            "GTYPE" => {
                let gtype = integer(keyword, values)?;
                if !(0..=MAX_GTYPE as i64).contains(&gtype) {
                    return Err(GxfError::format(format!(
                        "#GTYPE {} outside 0..={}",
                        gtype, MAX_GTYPE
                    )));
                }
                self.gtype = Some(gtype as usize);
            }
            "TRANSFORM" => {
                let numbers = numbers(values);
                match numbers.as_slice() {
                    [Some(scale), Some(offset), ..] => {
                        self.transform = Some(ValueTransform {
                            scale: *scale,
                            offset: *offset,
                        })
                    }
                    _ => {
                        return Err(GxfError::format(
                            "#TRANSFORM needs a scale and an offset",
                        ))
                    }
                }
            }
            "ZTYPE" => self.ztype = values.first().map(|v| v.trim_matches('"').to_string()),
            "ZMINIMUM" => self.z_minimum = soft_number(keyword, values),
            "ZMAXIMUM" => self.z_maximum = soft_number(keyword, values),
            "MAP_PROJECTION" => self.map_projection = values.to_vec(),
            "MAP_DATUM_TRANSFORM" => self.map_datum_transform = values.to_vec(),
            "UNIT_LENGTH" => {
                let fields: Vec<String> = values.iter().flat_map(|v| split_fields(v)).collect();
                match (fields.first(), fields.get(1).map(|f| f.parse::<f64>())) {
                    (Some(name), Some(Ok(factor))) if factor > 0.0 => {
                        self.unit_length = Some(UnitLength {
                            name: name.clone(),
                            factor,
                        });
                    }
                    _ => warn!("Ignoring malformed #UNIT_LENGTH: {:?}", values),
                }
            }
            other => debug!("Skipping unrecognised keyword #{}", other),
        }
        Ok(())
    }

    fn finish(self, options: &DecodeOptions) -> Result<Header> {
        let points = self
            .points
            .ok_or_else(|| GxfError::format("missing #POINTS"))?;
        let rows = self.rows.ok_or_else(|| GxfError::format("missing #ROWS"))?;

        let cells = rows
            .checked_mul(points)
            .filter(|&cells| cells <= options.max_cells)
            .ok_or_else(|| {
                GxfError::format(format!(
                    "grid of {} x {} exceeds the limit of {} cells",
                    rows, points, options.max_cells
                ))
            })?;

        let (pt_separation, row_separation) = match (self.pt_separation, self.row_separation) {
            (Some(pt), Some(row)) => (pt, row),
            (pt, row) if !options.require_geometry => {
                debug!("Missing separations default to 1");
                (pt.unwrap_or(1.0), row.unwrap_or(1.0))
            }
            (None, _) => return Err(GxfError::format("missing #PTSEPARATION")),
            (_, None) => return Err(GxfError::format("missing #ROWSEPARATION")),
        };

        debug!(
            "Header: {} rows x {} points ({} cells), separation {} / {}",
            rows, points, cells, pt_separation, row_separation
        );

        Ok(Header {
            title: self.title,
            points,
            rows,
            pt_separation,
            row_separation,
            x_origin: self.x_origin.unwrap_or(0.0),
            y_origin: self.y_origin.unwrap_or(0.0),
            rotation: self.rotation.unwrap_or(0.0),
            sense: self.sense.unwrap_or_default(),
            dummy: self.dummy,
            gtype: self.gtype.unwrap_or(0),
            transform: self.transform.unwrap_or_default(),
            ztype: self.ztype,
            z_minimum: self.z_minimum,
            z_maximum: self.z_maximum,
            map_projection: self.map_projection,
            map_datum_transform: self.map_datum_transform,
            unit_length: self.unit_length,
        })
    }
}

fn tokens(values: &[String]) -> impl Iterator<Item = &str> {
    values
        .iter()
        .flat_map(|v| v.split(|c: char| c.is_whitespace() || c == ','))
        .map(|t| t.trim_matches('"'))
        .filter(|t| !t.is_empty())
}

fn first_token(keyword: &str, values: &[String]) -> Result<String> {
    tokens(values)
        .next()
        .map(str::to_string)
        .ok_or_else(|| GxfError::format(format!("#{} has no value", keyword)))
}

fn number(keyword: &str, values: &[String]) -> Result<f64> {
    let token = first_token(keyword, values)?;
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GxfError::format(format!("#{} is not numeric: {:?}", keyword, token)))
}

fn integer(keyword: &str, values: &[String]) -> Result<i64> {
    let value = number(keyword, values)?;
    if value.fract() != 0.0 {
        return Err(GxfError::format(format!(
            "#{} must be an integer, got {}",
            keyword, value
        )));
    }
    Ok(value as i64)
}

fn count(keyword: &str, values: &[String]) -> Result<usize> {
    let value = integer(keyword, values)?;
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| GxfError::format(format!("#{} must be positive, got {}", keyword, value)))
}

fn separation(keyword: &str, values: &[String]) -> Result<f64> {
    let value = number(keyword, values)?;
    if value == 0.0 {
        return Err(GxfError::format(format!("#{} must be non-zero", keyword)));
    }
    Ok(value)
}

fn numbers(values: &[String]) -> Vec<Option<f64>> {
    tokens(values).map(|t| t.parse::<f64>().ok()).collect()
}

fn soft_number(keyword: &str, values: &[String]) -> Option<f64> {
    match number(keyword, values) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring #{}: {}", keyword, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::GxfSource;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Header> {
        let mut source = GxfSource::new(Cursor::new(text.to_string()));
        parse_header(&mut source, &DecodeOptions::default())
    }

    const MINIMAL: &str = "\
#POINTS
3
#ROWS
2
#PTSEPARATION
10
#ROWSEPARATION
20
#GRID
1 2 3 4 5 6
";

    #[test]
    fn test_parse_minimal_header() {
        let header = parse(MINIMAL).unwrap();
        assert_eq!(header.points, 3);
        assert_eq!(header.rows, 2);
        assert_eq!(header.pt_separation, 10.0);
        assert_eq!(header.row_separation, 20.0);
        assert_eq!(header.x_origin, 0.0);
        assert_eq!(header.sense, Sense::LowerLeftRight);
        assert_eq!(header.dummy, None);
        assert_eq!(header.gtype, 0);
    }

    #[test]
    fn test_source_positioned_after_grid_marker() {
        let mut source = GxfSource::new(Cursor::new(MINIMAL.to_string()));
        parse_header(&mut source, &DecodeOptions::default()).unwrap();
        assert_eq!(source.read_rest().unwrap(), b"1 2 3 4 5 6\n");
    }

    #[test]
    fn test_keywords_are_case_and_space_insensitive() {
        let text = "preamble text\n#  points 3\n#Rows\n  2\n#ptSeparation 1\n#rowseparation\n1\n#grid\n";
        let header = parse(text).unwrap();
        assert_eq!((header.points, header.rows), (3, 2));
    }

    #[test]
    fn test_cols_is_alias_for_points() {
        let text = "#COLS\n4\n#ROWS\n1\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n";
        assert_eq!(parse(text).unwrap().points, 4);
    }

    #[test]
    fn test_optional_fields() {
        let text = "\
#TITLE
\"Magnetic survey\"
#POINTS
2
#ROWS
2
#PTSEPARATION
25.0
#ROWSEPARATION
25.0
#XORIGIN
500000
#YORIGIN
4000000.5
#ROTATION
15
#SENSE
-2
#DUMMY
-1e32
#ZTYPE
FLOAT
#TRANSFORM
0.5 100
#ZMINIMUM
-4.5
#UNIT_LENGTH
ftUS,0.3048006096012
#SOMETHING_NEW
ignored value
#GRID
";
        let header = parse(text).unwrap();
        assert_eq!(header.title.as_deref(), Some("Magnetic survey"));
        assert_eq!(header.x_origin, 500000.0);
        assert_eq!(header.y_origin, 4000000.5);
        assert_eq!(header.rotation, 15.0);
        assert_eq!(header.sense, Sense::UpperLeftRight);
        let dummy = header.dummy.unwrap();
        assert_eq!(dummy.text, "-1e32");
        assert_eq!(dummy.value, -1e32);
        assert_eq!(header.ztype.as_deref(), Some("FLOAT"));
        assert_eq!(
            header.transform,
            ValueTransform {
                scale: 0.5,
                offset: 100.0
            }
        );
        assert_eq!(header.z_minimum, Some(-4.5));
        let unit = header.unit_length.unwrap();
        assert_eq!(unit.name, "ftUS");
        assert_eq!(unit.factor, 0.3048006096012);
    }

    #[test]
    fn test_map_projection_lines_kept() {
        let text = "#POINTS\n1\n#ROWS\n1\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n\
#MAP_PROJECTION\n\"NAD27 / Ohio North\"\n\"NAD27\",6378206.4,0.0822718542230039,0\n#GRID\n";
        let header = parse(text).unwrap();
        assert_eq!(header.map_projection.len(), 2);
        assert_eq!(header.map_projection[0], "\"NAD27 / Ohio North\"");
    }

    #[test]
    fn test_missing_rows_is_format_error() {
        let text = "#POINTS\n3\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n1 2 3\n";
        match parse(text) {
            Err(GxfError::Format(msg)) => assert!(msg.contains("#ROWS")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_points_is_format_error() {
        let text = "#ROWS\n3\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n1 2 3\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));
    }

    #[test]
    fn test_non_numeric_rows_is_format_error() {
        let text = "#POINTS\n3\n#ROWS\nmany\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));
    }

    #[test]
    fn test_keyword_errors_name_the_line() {
        let text = "! comment\n#POINTS\n3\n#ROWS\nmany\n#GRID\n";
        match parse(text) {
            Err(GxfError::Format(msg)) => {
                assert!(msg.starts_with("line 4: "), "{}", msg);
                assert!(msg.contains("#ROWS"));
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_and_negative_counts_rejected() {
        let text = "#POINTS\n0\n#ROWS\n3\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));
        let text = "#POINTS\n3\n#ROWS\n-3\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));
    }

    #[test]
    fn test_missing_geometry() {
        let text = "#POINTS\n3\n#ROWS\n1\n#GRID\n1 2 3\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));

        let mut source = GxfSource::new(Cursor::new(text.to_string()));
        let header =
            parse_header(&mut source, &DecodeOptions::default().lenient_geometry()).unwrap();
        assert_eq!(header.pt_separation, 1.0);
        assert_eq!(header.row_separation, 1.0);
    }

    #[test]
    fn test_zero_separation_rejected() {
        let text = "#POINTS\n3\n#ROWS\n1\n#PTSEPARATION\n0\n#ROWSEPARATION\n1\n#GRID\n";
        assert!(matches!(parse(text), Err(GxfError::Format(_))));
    }

    #[test]
    fn test_invalid_sense_and_gtype() {
        let base = "#POINTS\n1\n#ROWS\n1\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n";
        assert!(matches!(
            parse(&format!("{}#SENSE\n7\n#GRID\n", base)),
            Err(GxfError::Format(_))
        ));
        assert!(matches!(
            parse(&format!("{}#GTYPE\n12\n#GRID\n", base)),
            Err(GxfError::Format(_))
        ));
        assert!(matches!(
            parse(&format!("{}#DUMMY\nnone\n#GRID\n", base)),
            Err(GxfError::Format(_))
        ));
    }

    #[test]
    fn test_missing_grid_marker() {
        let text = "#POINTS\n3\n#ROWS\n1\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n";
        match parse(text) {
            Err(GxfError::Format(msg)) => assert!(msg.contains("#GRID")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_cell_limit() {
        let text = "#POINTS\n1000\n#ROWS\n1000\n#PTSEPARATION\n1\n#ROWSEPARATION\n1\n#GRID\n";
        let mut source = GxfSource::new(Cursor::new(text.to_string()));
        let options = DecodeOptions {
            max_cells: 10,
            ..DecodeOptions::default()
        };
        assert!(matches!(
            parse_header(&mut source, &options),
            Err(GxfError::Format(_))
        ));
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(
            split_fields("\"NAD27\",6378206.4, 0.08 ,0"),
            vec!["NAD27", "6378206.4", "0.08", "0"]
        );
        assert_eq!(
            split_fields("\"Lambert, odd name\",1"),
            vec!["Lambert, odd name", "1"]
        );
    }
}
