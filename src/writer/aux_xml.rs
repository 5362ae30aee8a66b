//! GDAL PAM sidecar (`.aux.xml`) carrying the reference system, geotransform,
//! no-data value and band statistics of a decoded grid.

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::dataset::GxfDataset;

/// Sidecar path next to `raster_path`, e.g. `grid.tif` -> `grid.tif.aux.xml`.
pub fn aux_xml_path(raster_path: &Path) -> PathBuf {
    let mut name = raster_path.as_os_str().to_os_string();
    name.push(".aux.xml");
    PathBuf::from(name)
}

pub fn render_aux_xml(dataset: &GxfDataset) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("PAMDataset")))?;

    let wkt = dataset.spatial_reference_wkt();
    if !wkt.is_empty() {
        write_text_element(&mut writer, "SRS", &wkt)?;
    }

    let gt = dataset.geo_transform();
    let gt_text = gt
        .iter()
        .map(|v| format!("{:.16e}", v))
        .collect::<Vec<_>>()
        .join(", ");
    write_text_element(&mut writer, "GeoTransform", &gt_text)?;

    let items = dataset_metadata(dataset);
    if !items.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("Metadata")))?;
        for (key, value) in &items {
            write_mdi(&mut writer, key, value)?;
        }
        writer.write_event(Event::End(BytesEnd::new("Metadata")))?;
    }

    let band = BytesStart::new("PAMRasterBand").with_attributes([("band", "1")]);
    writer.write_event(Event::Start(band))?;

    if let Some(no_data) = dataset.no_data_value() {
        write_text_element(&mut writer, "NoDataValue", &no_data.to_string())?;
    }

    if let Some(stats) = dataset.statistics() {
        writer.write_event(Event::Start(BytesStart::new("Metadata")))?;
        for (key, value) in [
            ("STATISTICS_MINIMUM", stats.min),
            ("STATISTICS_MAXIMUM", stats.max),
            ("STATISTICS_MEAN", stats.mean),
            ("STATISTICS_STDDEV", stats.std_dev),
        ] {
            write_mdi(&mut writer, key, &value.to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new("Metadata")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("PAMRasterBand")))?;
    writer.write_event(Event::End(BytesEnd::new("PAMDataset")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("PAM XML is not UTF-8")
}

/// Writes the sidecar for `raster_path` and returns its path.
pub fn write_aux_xml(dataset: &GxfDataset, raster_path: &Path) -> Result<PathBuf> {
    let path = aux_xml_path(raster_path);
    let xml = render_aux_xml(dataset)?;
    std::fs::write(&path, xml).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!("Written PAM sidecar: {:?}", path);
    Ok(path)
}

/// Dataset level items: the title and the `#ZTYPE` / `#ZMINIMUM` /
/// `#ZMAXIMUM` declarations.
fn dataset_metadata(dataset: &GxfDataset) -> Vec<(&'static str, String)> {
    let header = dataset.header();
    let mut items = Vec::new();
    if let Some(title) = dataset.title() {
        items.push(("TITLE", title.to_string()));
    }
    if let Some(ztype) = &header.ztype {
        items.push(("ZTYPE", ztype.clone()));
    }
    if let Some(z) = header.z_minimum {
        items.push(("ZMINIMUM", z.to_string()));
    }
    if let Some(z) = header.z_maximum {
        items.push(("ZMAXIMUM", z.to_string()));
    }
    items
}

fn write_mdi(writer: &mut Writer<Cursor<Vec<u8>>>, key: &str, value: &str) -> Result<()> {
    let mdi = BytesStart::new("MDI").with_attributes([("key", key)]);
    writer.write_event(Event::Start(mdi))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("MDI")))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
