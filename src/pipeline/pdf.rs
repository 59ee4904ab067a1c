//! PDF assembly: staged images → one PDF with one page per image.
//!
//! Page order is input order. Each page's MediaBox is the image size, one
//! PDF point per pixel, and the image fills the page.
//!
//! ## Image embedding
//!
//! - RGB and grayscale JPEGs are embedded as-is with `DCTDecode`; the decode
//!   pass only validates the data and reads its dimensions.
//! - Everything else is decoded with `image`, flattened to 8-bit RGB and
//!   stored `FlateDecode`-compressed.
//! - Images with an alpha channel carry the alpha plane as a grayscale
//!   `SMask`, so transparent regions stay transparent.
//!
//! An undecodable input fails the whole document; no partial PDF is written.
//! lopdf is synchronous, so [`assemble_pdf`] runs the work in
//! `spawn_blocking`.

use crate::error::ConverterError;
use crate::pipeline::write_atomically;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the image XObject in each page's resources.
const IMAGE_RESOURCE: &str = "Im0";

/// Compose `image_paths` into a PDF at `output`, one page per image.
///
/// # Returns
/// The number of pages written.
pub async fn assemble_pdf(
    image_paths: Vec<PathBuf>,
    output: &Path,
) -> Result<usize, ConverterError> {
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || assemble_pdf_blocking(&image_paths, &output))
        .await
        .map_err(|e| ConverterError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Blocking implementation of PDF assembly.
fn assemble_pdf_blocking(image_paths: &[PathBuf], output: &Path) -> Result<usize, ConverterError> {
    let mut document = build_document(image_paths)?;

    write_atomically(output, |writer| {
        document
            .save_to(writer)
            .map_err(|e| ConverterError::PdfAssembly(e.to_string()))
    })?;

    info!(
        "PDF written: {} pages → {}",
        image_paths.len(),
        output.display()
    );
    Ok(image_paths.len())
}

/// Build the in-memory document. Nothing touches the output path until
/// every image has been decoded.
pub fn build_document(image_paths: &[PathBuf]) -> Result<Document, ConverterError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(image_paths.len());

    for (idx, path) in image_paths.iter().enumerate() {
        let page_id = add_image_page(&mut doc, pages_id, path)?;
        debug!("Page {} ← {}", idx + 1, path.display());
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

/// Add one page holding the image at `path`, sized to the image.
fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    path: &Path,
) -> Result<ObjectId, ConverterError> {
    let embedded = load_image(path)?;
    let (width, height) = (embedded.width as i64, embedded.height as i64);

    let mut image_stream = embedded.stream;
    if let Some(mask) = embedded.soft_mask {
        let mask_id = doc.add_object(mask);
        image_stream.dict.set("SMask", mask_id);
    }
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| ConverterError::PdfAssembly(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_RESOURCE => image_id,
            },
        },
    }))
}

/// An image ready to be added as an XObject.
struct EmbeddedImage {
    width: u32,
    height: u32,
    stream: Stream,
    soft_mask: Option<Stream>,
}

fn load_image(path: &Path) -> Result<EmbeddedImage, ConverterError> {
    let undecodable = |detail: String| ConverterError::UndecodableImage {
        path: path.to_path_buf(),
        detail,
    };

    let bytes = std::fs::read(path).map_err(|e| ConverterError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let format = image::guess_format(&bytes).map_err(|e| undecodable(e.to_string()))?;
    let img = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| undecodable(e.to_string()))?;

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(undecodable("image has zero width or height".into()));
    }

    if format == ImageFormat::Jpeg {
        let color_space = match img.color() {
            ColorType::Rgb8 => Some("DeviceRGB"),
            ColorType::L8 => Some("DeviceGray"),
            _ => None,
        };
        if let Some(color_space) = color_space {
            debug!("Embedding JPEG {}x{} without re-encoding", width, height);
            let stream = Stream::new(image_dict(width, height, color_space, "DCTDecode"), bytes)
                .with_compression(false);
            return Ok(EmbeddedImage {
                width,
                height,
                stream,
                soft_mask: None,
            });
        }
    }

    let soft_mask = if img.color().has_alpha() {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
        Some(flate_stream(width, height, "DeviceGray", &alpha)?)
    } else {
        None
    };

    let rgb = img.to_rgb8();
    let stream = flate_stream(width, height, "DeviceRGB", rgb.as_raw())?;

    Ok(EmbeddedImage {
        width,
        height,
        stream,
        soft_mask,
    })
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => filter,
    }
}

/// Zlib-compress raw 8-bit samples into an image stream.
fn flate_stream(
    width: u32,
    height: u32,
    color_space: &str,
    samples: &[u8],
) -> Result<Stream, ConverterError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(samples)
        .map_err(|e| ConverterError::PdfAssembly(format!("deflate: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ConverterError::PdfAssembly(format!("deflate: {e}")))?;

    Ok(
        Stream::new(image_dict(width, height, color_space, "FlateDecode"), compressed)
            .with_compression(false),
    )
}
