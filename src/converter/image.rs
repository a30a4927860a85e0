use crate::converter::DocumentConverter;
use crate::error::{DossierError, Result};
use image::GenericImageView;
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".bmp", ".gif", ".tif", ".tiff", ".webp",
];

// US Letter with a half-inch margin.
const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 36.0;

/// Renders a raster image centered on a single PDF page.
#[derive(Debug, Clone, Default)]
pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentConverter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn supports(&self, extension: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&extension)
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let mut document = image_document(source)?;

        let target_dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&target_dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&target_dir)?;
        document.save_to(staged.as_file_mut())?;
        staged.persist(target).map_err(|e| DossierError::Io(e.error))?;
        Ok(())
    }
}

fn image_document(source: &Path) -> Result<Document> {
    let img = image::open(source).map_err(|e| DossierError::ConversionFailure {
        path: source.display().to_string(),
        message: format!("failed to load image: {}", e),
    })?;

    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    });

    let available_width = PAGE_WIDTH - 2.0 * MARGIN;
    let available_height = PAGE_HEIGHT - 2.0 * MARGIN;
    let scale = (available_width / width as f64).min(available_height / height as f64);

    let img_width = (width as f64 * scale) as i64;
    let img_height = (height as f64 * scale) as i64;
    let x = ((PAGE_WIDTH - img_width as f64) / 2.0) as i64;
    let y = ((PAGE_HEIGHT - img_height as f64) / 2.0) as i64;

    let content = format!(
        "q\n{} 0 0 {} {} {} cm\n/Im1 Do\nQ\n",
        img_width, img_height, x, y
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(doc)
}
