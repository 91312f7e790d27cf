//! JPEG to PDF conversion using lopdf
//!
//! Each JPEG is embedded as-is (DCTDecode), never decoded to pixels or
//! re-encoded. Every page is sized to its image at the density recorded in
//! the file, and turned to match its EXIF orientation.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use image::metadata::Orientation;
use image::{ImageDecoder, ImageFormat, ImageReader};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;
use super::jpeg::{read_markers, JpegColorSpace};
use crate::error::{Error, Result};

/// Density assumed for images that record none, in dots per inch
pub const DEFAULT_DPI: f32 = 96.0;

/// Options for converting images to PDF
#[derive(Debug, Clone)]
pub struct ImagePdfOptions {
    /// Image paths in page order
    pub image_paths: Vec<PathBuf>,
    /// Output PDF file path
    pub output_path: PathBuf,
    /// Density for images without a JFIF density
    pub dpi: f32,
}

/// Header facts needed to embed a JPEG
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub color_space: JpegColorSpace,
    /// Adobe CMYK data is stored inverted
    pub inverted: bool,
    /// Recorded density in dots per inch, if any
    pub density: Option<(f32, f32)>,
    /// Clockwise page rotation in degrees
    pub rotation: i64,
}

/// Page rotation that displays an image upright
///
/// Mirrored orientations cannot be expressed by `/Rotate` and are left as stored.
fn page_rotation(orientation: Orientation) -> i64 {
    match orientation {
        Orientation::Rotate90 => 90,
        Orientation::Rotate180 => 180,
        Orientation::Rotate270 => 270,
        _ => 0,
    }
}

/// Sniff the format and decode the JPEG header of `bytes`
///
/// Fails if the data is not a JPEG or its header cannot be decoded.
pub fn inspect_jpeg(path: &Path, bytes: &[u8]) -> Result<JpegInfo> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format() != Some(ImageFormat::Jpeg) {
        return Err(Error::NotJpeg(path.to_path_buf()));
    }

    let mut decoder = reader.into_decoder().map_err(|source| Error::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::NotJpeg(path.to_path_buf()));
    }
    let orientation = decoder.orientation()?;

    let markers = read_markers(bytes);
    let components = markers.components.ok_or_else(|| Error::NotJpeg(path.to_path_buf()))?;
    let color_space = JpegColorSpace::from_components(components).ok_or_else(|| {
        Error::General(format!(
            "Unsupported JPEG with {} color components: {}",
            components,
            path.display()
        ))
    })?;

    Ok(JpegInfo {
        width,
        height,
        color_space,
        inverted: color_space == JpegColorSpace::Cmyk && markers.adobe,
        density: markers.density,
        rotation: page_rotation(orientation),
    })
}

/// Build an in-memory PDF with one full-page image per path
pub fn build_image_document<P: AsRef<Path>>(image_paths: &[P], dpi: f32) -> Result<Document> {
    if image_paths.is_empty() {
        return Err(Error::General("No input images provided".to_string()));
    }
    if dpi.is_nan() || dpi <= 0.0 {
        return Err(Error::InvalidOption(format!("dpi must be positive, got {}", dpi)));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(image_paths.len());

    for path in image_paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let info = inspect_jpeg(path, &bytes)?;
        let page_id = add_image_page(&mut doc, pages_id, info, bytes, dpi);
        kids.push(Object::Reference(page_id));

        debug!(
            image = %path.display(),
            width = info.width,
            height = info.height,
            color_space = ?info.color_space,
            rotation = info.rotation,
            "embedded image"
        );
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

/// Add one page showing `jpeg` scaled to the page
fn add_image_page(
    doc: &mut Document,
    pages_id: lopdf::ObjectId,
    info: JpegInfo,
    jpeg: Vec<u8>,
    dpi: f32,
) -> lopdf::ObjectId {
    let (dpi_x, dpi_y) = info.density.unwrap_or((dpi, dpi));
    let width = info.width as f32 * 72.0 / dpi_x;
    let height = info.height as f32 * 72.0 / dpi_y;

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(info.width as i64));
    image_dict.set("Height", Object::Integer(info.height as i64));
    image_dict.set("ColorSpace", Object::Name(info.color_space.pdf_name().to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    if info.inverted {
        let decode = [1, 0, 1, 0, 1, 0, 1, 0].into_iter().map(Object::Integer).collect();
        image_dict.set("Decode", Object::Array(decode));
    }
    image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    // Already compressed; Document::compress must leave it alone
    let mut image_stream = Stream::new(image_dict, jpeg);
    image_stream.allows_compression = false;
    let image_id = doc.add_object(Object::Stream(image_stream));

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("MediaBox", Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(width),
        Object::Real(height),
    ]));
    if info.rotation != 0 {
        page.set("Rotate", Object::Integer(info.rotation));
    }
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));

    doc.add_object(Object::Dictionary(page))
}

/// Save `doc` to a path that must not exist yet
pub fn save_new(doc: &mut Document, output_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_path)?;

    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)?;
    writer.flush()?;

    Ok(())
}

/// Convert JPEG images to a single PDF in one pass
///
/// The output file must not already exist.
///
/// # Example
///
/// ```no_run
/// use bind_pdf::pdf::{images_to_pdf, ImagePdfOptions, DEFAULT_DPI};
/// use std::path::PathBuf;
///
/// let options = ImagePdfOptions {
///     image_paths: vec![PathBuf::from("1.jpg"), PathBuf::from("2.jpg")],
///     output_path: PathBuf::from("scans.pdf"),
///     dpi: DEFAULT_DPI,
/// };
///
/// images_to_pdf(&options).expect("Failed to convert");
/// ```
pub fn images_to_pdf(options: &ImagePdfOptions) -> Result<()> {
    let mut doc = build_image_document(&options.image_paths, options.dpi)?;
    doc.compress();
    save_new(&mut doc, &options.output_path)
}
