pub mod aux_xml;

use anyhow::{Context, Result};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{DriverManager, Metadata};
use std::path::Path;

use crate::dataset::GxfDataset;

#[derive(Default)]
pub struct GeoTiffWriter {}

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self {}
    }

    /// Writes the grid as a single band `Float32` GeoTIFF.
    pub fn write(&self, dataset: &GxfDataset, output_path: &Path) -> Result<()> {
        let (cols, rows) = (dataset.width(), dataset.height());

        tracing::info!("Writing GeoTIFF: {} x {} pixels", cols, rows);

        let driver =
            DriverManager::get_driver_by_name("GTiff").context("Failed to get GTiff driver")?;

        let mut gtiff = driver
            .create_with_band_type::<f32, _>(output_path, cols, rows, 1)
            .context("Failed to create dataset")?;

        gtiff
            .set_geo_transform(&dataset.geo_transform())
            .context("Failed to set geo transform")?;

        self.set_projection(&mut gtiff, dataset)?;

        let mut band = gtiff.rasterband(1).context("Failed to get raster band")?;

        if let Some(no_data) = dataset.no_data_value() {
            band.set_no_data_value(Some(no_data))
                .context("Failed to set no data value")?;
        }

        // Grid values are already row-major and north-up.
        let mut buffer = Buffer::new((cols, rows), dataset.values().to_vec());
        band.write((0, 0), (cols, rows), &mut buffer)
            .context("Failed to write raster data")?;

        if let Some(title) = dataset.title() {
            gtiff
                .set_metadata_item("GXF_TITLE", title, "")
                .context("Failed to set title metadata")?;
        }
        let header = dataset.header();
        let mut items = vec![("GXF_SENSE", header.sense.code().to_string())];
        if let Some(ztype) = &header.ztype {
            items.push(("GXF_ZTYPE", ztype.clone()));
        }
        if let Some(z) = header.z_minimum {
            items.push(("GXF_ZMINIMUM", z.to_string()));
        }
        if let Some(z) = header.z_maximum {
            items.push(("GXF_ZMAXIMUM", z.to_string()));
        }
        for (key, value) in items {
            gtiff
                .set_metadata_item(key, &value, "")
                .with_context(|| format!("Failed to set {} metadata", key))?;
        }

        Ok(())
    }

    fn set_projection(&self, gtiff: &mut gdal::Dataset, dataset: &GxfDataset) -> Result<()> {
        let wkt = dataset.spatial_reference_wkt();
        if wkt.is_empty() {
            tracing::warn!("No spatial reference, GeoTIFF will lack CRS metadata");
            return Ok(());
        }

        // Round-trip through OSR so GDAL writes its own normalised WKT.
        let srs = SpatialRef::from_wkt(&wkt).context("GDAL rejected the GXF projection")?;
        let wkt = srs
            .to_wkt()
            .context("Failed to convert SpatialRef to WKT")?;
        gtiff
            .set_projection(&wkt)
            .context("Failed to set projection")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::decode;
    use gdal::Dataset;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn gtiff_available() -> bool {
        DriverManager::get_driver_by_name("GTiff").is_ok()
    }

    const GRID: &str = "\
#TITLE
\"writer test\"
#POINTS
3
#ROWS
2
#PTSEPARATION
0.001
#ROWSEPARATION
0.001
#XORIGIN
135.0005
#YORIGIN
34.9985
#DUMMY
-9999
#ZMAXIMUM
105
#MAP_PROJECTION
\"WGS 84\"
\"WGS84\",6378137,0.0818191908426,0
#GRID
100 101 102
103 -9999 105
";

    #[test]
    fn test_write_geotiff() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("test.tif");

        let dataset = decode(Cursor::new(GRID)).unwrap();
        GeoTiffWriter::new().write(&dataset, &output_path).unwrap();
        assert!(output_path.exists());

        let written = Dataset::open(&output_path).unwrap();
        assert_eq!(written.raster_size(), (3, 2));

        let transform = written.geo_transform().unwrap();
        for (a, b) in transform.iter().zip(dataset.geo_transform().iter()) {
            assert!((a - b).abs() < 1e-9);
        }

        let band = written.rasterband(1).unwrap();
        assert_eq!(band.no_data_value(), Some(-9999.0));
        assert!(!written.projection().is_empty());
        assert_eq!(
            written.metadata_item("GXF_ZMAXIMUM", ""),
            Some("105".to_string())
        );
        assert_eq!(written.metadata_item("GXF_SENSE", ""), Some("1".to_string()));
    }
}
