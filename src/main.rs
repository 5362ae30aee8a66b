use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

use gxf::writer::aux_xml::write_aux_xml;
use gxf::{open_with_options, DecodeOptions, Encoding, GeoTiffWriter, GxfArchive, GxfDataset};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input GXF file, ZIP archive, or directory
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Write a GeoTIFF per grid into this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Also write a GDAL PAM `.aux.xml` sidecar next to each GeoTIFF
    #[arg(long, requires = "output")]
    aux_xml: bool,

    /// Force the grid encoding instead of detecting it
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,

    /// Default missing cell separations to 1 instead of failing
    #[arg(long)]
    lenient_geometry: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum EncodingArg {
    Plain,
    Compressed,
    Continuous,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Plain => Encoding::PlainText,
            EncodingArg::Compressed => Encoding::Compressed,
            EncodingArg::Continuous => Encoding::ContinuousLine,
        }
    }
}

impl Args {
    fn decode_options(&self) -> DecodeOptions {
        let mut options = DecodeOptions::default();
        if let Some(encoding) = self.encoding {
            options = options.with_encoding(encoding.into());
        }
        if self.lenient_geometry {
            options = options.lenient_geometry();
        }
        options
    }
}

#[derive(Debug, Clone, Copy)]
enum FileType {
    Gxf,
    Zip,
}

fn file_type(path: &Path) -> Option<FileType> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "gxf" => Some(FileType::Gxf),
        "zip" => Some(FileType::Zip),
        _ => None,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    if let Some(output) = &args.output {
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create output directory {:?}", output))?;
    }

    if args.input.is_file() {
        match file_type(&args.input) {
            Some(FileType::Gxf) => {
                let root = args.input.parent().unwrap_or(Path::new(""));
                process_file(&args.input, root, &args)?
            }
            Some(FileType::Zip) => process_zip_file(&args.input, None, &args)?,
            None => {
                error!("Unsupported file type: {:?}", args.input);
                anyhow::bail!("Input file must be .gxf or .zip");
            }
        }
    } else if args.input.is_dir() {
        info!("Processing directory: {:?}", args.input);
        process_directory(&args.input, &args)?;
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    }

    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

/// Output file stem for `path` relative to `root`: directories and the file
/// stem joined with `_`, so `a/x.gxf` and `b/x.gxf` stay distinct.
fn output_stem(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "grid".to_string());
    parts.push(stem);
    parts.join("_")
}

fn process_file(path: &Path, root: &Path, args: &Args) -> Result<()> {
    info!("Processing GXF file: {:?}", path);
    let dataset = open_with_options(path, &args.decode_options())
        .with_context(|| format!("Failed to decode {:?}", path))?;

    emit(&output_stem(path, root), &dataset, args)
}

/// With `root` set (directory mode) entry names are prefixed by the archive's
/// own relative stem.
fn process_zip_file(path: &Path, root: Option<&Path>, args: &Args) -> Result<()> {
    info!("Processing ZIP file: {:?}", path);
    let archive = GxfArchive::new(path).with_options(args.decode_options());
    let grids = archive
        .decode_all()
        .with_context(|| format!("Failed to decode archive {:?}", path))?;

    if grids.is_empty() {
        info!("No GXF entries in {:?}", path);
    }
    let prefix = root.map(|root| output_stem(path, root));
    for (entry, dataset) in &grids {
        let entry_stem = output_stem(Path::new(entry), Path::new(""));
        let name = match &prefix {
            Some(prefix) => format!("{}_{}", prefix, entry_stem),
            None => entry_stem,
        };
        emit(&name, dataset, args)?;
    }
    Ok(())
}

fn process_directory(dir: &Path, args: &Args) -> Result<()> {
    let input_files = collect_input_files(dir)?;
    info!("Found {} input files (GXF/ZIP)", input_files.len());

    let results: Vec<Result<()>> = input_files
        .par_iter()
        .map(|(path, file_type)| match file_type {
            FileType::Gxf => process_file(path, dir, args),
            FileType::Zip => process_zip_file(path, Some(dir), args),
        })
        .collect();

    let errors: Vec<String> = results
        .into_iter()
        .zip(&input_files)
        .filter_map(|(result, (path, _))| {
            result.err().map(|e| format!("{}: {:#}", path.display(), e))
        })
        .collect();

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(collect_input_files(&path)?);
        } else if let Some(file_type) = file_type(&path) {
            files.push((path, file_type));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Prints the summary line and writes the optional outputs for one grid.
fn emit(name: &str, dataset: &GxfDataset, args: &Args) -> Result<()> {
    let wkt = dataset.spatial_reference_wkt();
    println!(
        "{}: {}x{} {:?} checksum={} srs={}",
        name,
        dataset.width(),
        dataset.height(),
        dataset.encoding(),
        dataset.band_checksum(),
        if wkt.is_empty() { "undefined" } else { wkt.as_str() }
    );

    let Some(output) = &args.output else {
        return Ok(());
    };

    let output_path = output.join(format!("{}.tif", name));
    GeoTiffWriter::new().write(dataset, &output_path)?;
    info!("Written GeoTIFF: {:?}", output_path);

    if args.aux_xml {
        write_aux_xml(dataset, &output_path)?;
    }
    Ok(())
}
