// src/pipeline/stages/images.rs

//! Image compression and inline-image stylesheet generation.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};

use crate::errors::StageError;
use crate::pipeline::{Asset, Stage, StageFuture, StageResult, ready};

use super::log_size;

const COMPRESS: &str = "compress";

/// Lossless PNG re-encoding and quality-bounded JPEG re-encoding.
///
/// The re-encoded bytes are only kept when they are smaller. Formats other
/// than PNG and JPEG pass through untouched.
#[derive(Debug, Clone, Copy)]
pub struct Compress {
    jpeg_quality: u8,
}

impl Compress {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn compress(&self, asset: &Asset) -> Result<Option<Vec<u8>>, StageError> {
        let format = match format_of(&asset.rel) {
            Some(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
            _ => return Ok(None),
        };
        let fail = |e: image::ImageError| StageError::new(COMPRESS, &asset.source, e.to_string());

        let img = image::load_from_memory_with_format(&asset.contents, format).map_err(fail)?;
        let mut out = Vec::new();
        match format {
            ImageFormat::Png => {
                PngEncoder::new_with_quality(
                    Cursor::new(&mut out),
                    CompressionType::Best,
                    FilterType::Adaptive,
                )
                .write_image(img.as_bytes(), img.width(), img.height(), img.color())
                .map_err(fail)?;
            }
            _ => {
                let rgb = img.to_rgb8();
                JpegEncoder::new_with_quality(Cursor::new(&mut out), self.jpeg_quality)
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(fail)?;
            }
        }

        Ok((out.len() < asset.contents.len()).then_some(out))
    }
}

impl Stage for Compress {
    fn name(&self) -> &'static str {
        COMPRESS
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let result: StageResult = assets
            .into_iter()
            .map(|mut asset| -> Result<Asset, StageError> {
                if let Some(smaller) = self.compress(&asset)? {
                    let before = asset.contents.len();
                    asset.contents = smaller;
                    log_size(COMPRESS, &asset, before);
                }
                Ok(asset)
            })
            .collect();
        ready(result)
    }
}

fn format_of(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Replace each asset's contents with a `data:` URI of itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUri;

impl Stage for DataUri {
    fn name(&self) -> &'static str {
        "data-uri"
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let encoded = assets
            .into_iter()
            .map(|mut asset| {
                let uri = format!(
                    "data:{};base64,{}",
                    mime_type(&asset.rel),
                    STANDARD.encode(&asset.contents)
                );
                asset.contents = uri.into_bytes();
                asset
            })
            .collect();
        ready(Ok(encoded))
    }
}

/// Fold data URIs into one stylesheet fragment, one class per image:
/// `.{namespace}-{stem} { background-image: url("data:..."); }`.
#[derive(Debug, Clone)]
pub struct StylesheetFragment {
    namespace: String,
    filename: String,
}

impl StylesheetFragment {
    pub fn new(namespace: &str, filename: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            filename: filename.to_string(),
        }
    }
}

impl Stage for StylesheetFragment {
    fn name(&self) -> &'static str {
        "stylesheet-fragment"
    }

    fn apply<'a>(&'a self, mut assets: Vec<Asset>) -> StageFuture<'a> {
        assets.sort_by(|a, b| a.rel.cmp(&b.rel));

        let mut css = String::new();
        for asset in &assets {
            let uri = match asset.text(self.name()) {
                Ok(uri) => uri,
                Err(e) => return ready(Err(e)),
            };
            let stem = asset
                .rel
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            css.push_str(&format!(
                ".{}-{} {{ background-image: url(\"{}\"); }}\n",
                self.namespace,
                css_ident(stem),
                uri
            ));
        }

        let source = assets
            .first()
            .and_then(|a| a.source.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        ready(Ok(vec![Asset::new(source, &self.filename, css)]))
    }
}

fn css_ident(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::path::PathBuf;

    fn noisy_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(32, 32, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([255u8, 0, 0, 255])
            } else {
                Rgba([0u8, 0, 255, 255])
            }
        });
        let mut out = Vec::new();
        PngEncoder::new_with_quality(Cursor::new(&mut out), CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 32, 32, ColorType::Rgba8)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn png_output_is_valid_and_never_larger() {
        let original = noisy_png();
        let asset = Asset::new("/p/src/images/a.png", "a.png", original.clone());

        let out = Compress::new(80).apply(vec![asset]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].contents.len() <= original.len());
        let decoded = image::load_from_memory(&out[0].contents).unwrap();
        assert_eq!(decoded.width(), 32);
    }

    #[tokio::test]
    async fn unknown_formats_pass_through() {
        let asset = Asset::new("/p/src/images/logo.svg", "logo.svg", "<svg/>");
        let out = Compress::new(80).apply(vec![asset.clone()]).await.unwrap();
        assert_eq!(out, vec![asset]);
    }

    #[tokio::test]
    async fn corrupt_png_is_a_stage_error() {
        let asset = Asset::new("/p/src/images/bad.png", "bad.png", "not a png");
        let err = Compress::new(80).apply(vec![asset]).await.unwrap_err();
        assert_eq!(err.stage, COMPRESS);
        assert_eq!(err.path, PathBuf::from("/p/src/images/bad.png"));
    }

    #[tokio::test]
    async fn fragment_has_one_sorted_rule_per_image() {
        let assets = vec![
            Asset::new("/p/src/images/inline/star.svg", "star.svg", "<svg/>"),
            Asset::new("/p/src/images/inline/arrow up.gif", "arrow up.gif", "GIF89a"),
        ];
        let uris = DataUri.apply(assets).await.unwrap();
        let out = StylesheetFragment::new("img", "_datauri.scss")
            .apply(uris)
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel, PathBuf::from("_datauri.scss"));
        let css = String::from_utf8(out[0].contents.clone()).unwrap();
        let lines: Vec<&str> = css.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(".img-arrow-up { background-image: url(\"data:image/gif;base64,"));
        assert!(lines[1].starts_with(".img-star { background-image: url(\"data:image/svg+xml;base64,"));
    }
}
