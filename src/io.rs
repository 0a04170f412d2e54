use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageError, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Extensions offered by the upload picker.  No validation happens beyond
/// this filter; whatever decodes, loads.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Default file name suggested by the save dialog.
pub const SNAPSHOT_NAME: &str = "camfe-snapshot.png";

/// Error type for file operations
#[derive(Debug)]
pub enum CamError {
    Io(std::io::Error),
    Encode(ImageError),
}

impl std::fmt::Display for CamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CamError::Io(e) => write!(f, "I/O error: {}", e),
            CamError::Encode(e) => write!(f, "Encode error: {}", e),
        }
    }
}

impl From<std::io::Error> for CamError {
    fn from(e: std::io::Error) -> Self {
        CamError::Io(e)
    }
}

impl From<ImageError> for CamError {
    fn from(e: ImageError) -> Self {
        CamError::Encode(e)
    }
}

/// Output encoding for a saved snapshot, inferred from the extension the
/// user chose in the save dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
}

impl SaveFormat {
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => SaveFormat::Jpeg,
            _ => SaveFormat::Png,
        }
    }
}

/// Dialog front-end for upload and download.  Remembers the last used
/// directory and format for the session (nothing is persisted).
pub struct FileHandler {
    pub last_save_dir: Option<PathBuf>,
    pub last_format: SaveFormat,
    /// JPEG quality used for snapshot export.
    pub jpeg_quality: u8,
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandler {
    pub fn new() -> Self {
        Self {
            last_save_dir: None,
            last_format: SaveFormat::Png,
            jpeg_quality: 90,
        }
    }

    /// Show the native picker and decode the chosen image.  Returns `None`
    /// both on cancel and on a failed decode; a cancelled picker leaves all
    /// app state untouched.
    pub fn pick_overlay_image(&mut self) -> Option<(RgbaImage, PathBuf)> {
        let path = FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file()?;

        match image::open(&path) {
            Ok(img) => {
                crate::log_info!("uploaded overlay image from {}", path.display());
                Some((img.to_rgba8(), path))
            }
            Err(e) => {
                crate::log_err!("failed to decode {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Show the native save dialog.  Returns the chosen path, or `None` on
    /// cancel.
    pub fn save_snapshot_dialog(&mut self, suggested: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("PNG", &["png"])
            .add_filter("JPEG", &["jpg", "jpeg"])
            .set_file_name(suggested);
        if let Some(dir) = &self.last_save_dir {
            dialog = dialog.set_directory(dir);
        }

        let path = dialog.save_file()?;
        self.last_save_dir = path.parent().map(|p| p.to_path_buf());
        self.last_format = SaveFormat::from_extension(&path);
        Some(path)
    }
}

/// Encode and write an image to disk.  Safe to call on a background thread.
pub fn save_image(
    img: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    jpeg_quality: u8,
) -> Result<(), CamError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, jpeg_quality).encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ColorType::Rgb8,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            SaveFormat::from_extension(Path::new("shot.png")),
            SaveFormat::Png
        );
        assert_eq!(
            SaveFormat::from_extension(Path::new("shot.JPG")),
            SaveFormat::Jpeg
        );
        assert_eq!(
            SaveFormat::from_extension(Path::new("shot.jpeg")),
            SaveFormat::Jpeg
        );
        // Unknown or missing extension defaults to PNG
        assert_eq!(
            SaveFormat::from_extension(Path::new("shot")),
            SaveFormat::Png
        );
        assert_eq!(
            SaveFormat::from_extension(Path::new("shot.webm")),
            SaveFormat::Png
        );
    }

    #[test]
    fn png_snapshot_roundtrips() {
        let mut img = RgbaImage::new(6, 4);
        img.put_pixel(2, 1, image::Rgba([200, 10, 30, 255]));
        let path = std::env::temp_dir().join("camfe-test-snapshot.png");

        save_image(&img, &path, SaveFormat::Png, 90).unwrap();
        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (6, 4));
        assert_eq!(reloaded.get_pixel(2, 1), &image::Rgba([200, 10, 30, 255]));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn jpeg_snapshot_writes_without_alpha() {
        let img = RgbaImage::from_pixel(8, 8, image::Rgba([120, 80, 40, 128]));
        let path = std::env::temp_dir().join("camfe-test-snapshot.jpg");

        save_image(&img, &path, SaveFormat::Jpeg, 90).unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.to_rgb8().dimensions(), (8, 8));

        let _ = std::fs::remove_file(&path);
    }
}
