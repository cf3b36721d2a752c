//! The delegate-codec family: pixel encode/decode via the `image` crate and
//! the metadata-carrying PNG path via the `png` crate.
//!
//! PNG text chunks only store strings, so [`immencode`] applies a tagged
//! encoding: string metadata values are stored verbatim, everything else is
//! serialized to a canonical JSON string under the same key. [`immdecode`]
//! deliberately does **not** reverse the JSON step — every non-reserved text
//! chunk comes back as the stored string. Writes may upcast; reads never
//! guess. The one reserved chunk, `pixel_format`, carries the image's pixel
//! format alongside the native color mode.

use std::io::{Cursor, Write};

use image::{DynamicImage, ImageFormat};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::imm::{Image, PixelArray, PixelFormat};

/// Reserved text-chunk key holding the pixel format of an encoded image.
pub const PIXEL_FORMAT_KEY: &str = "pixel_format";

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Codec-selection hints for the delegate family.
///
/// `extension` means "treat the resource as if it had this extension" and
/// always wins. `format_hint` is weaker: it is only consulted when content
/// sniffing fails, which helps with extensionless streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecHints {
    pub extension: Option<String>,
    pub format_hint: Option<String>,
}

impl CodecHints {
    /// Hints that force a specific extension, e.g. `".png"`.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            ..Self::default()
        }
    }
}

/// Native per-file metadata obtained without decoding pixels.
#[derive(Debug, Clone)]
pub struct NativeMeta {
    /// Native color mode name (`"L"`, `"P"`, `"RGB"`, `"RGBA"`, ...).
    pub mode: String,
    /// Text-chunk entries in file order.
    pub texts: Vec<(String, String)>,
}

// ── pixel-only paths (read-plain / write-plain) ──────────────────────

/// Decode a pixel array from encoded bytes.
///
/// An unrecognized extension hint or content is passed through to the
/// underlying codec untouched; its unsupported-format error surfaces as-is.
pub fn decode_pixels(bytes: &[u8], hints: &CodecHints) -> Result<PixelArray> {
    dynamic_to_array(load_dynamic(bytes, hints)?)
}

/// Encode a pixel array into the container the extension names.
pub fn encode_pixels(pixels: &PixelArray, extension: &str) -> Result<Vec<u8>> {
    let format = extension_format(extension)
        .ok_or_else(|| Error::UnsupportedFormat(extension.to_string()))?;
    let img = array_to_dynamic(pixels)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

fn load_dynamic(bytes: &[u8], hints: &CodecHints) -> Result<DynamicImage> {
    if let Some(format) = hints.extension.as_deref().and_then(extension_format) {
        return Ok(image::load_from_memory_with_format(bytes, format)?);
    }
    match image::load_from_memory(bytes) {
        Ok(img) => Ok(img),
        Err(sniff_err) => {
            if let Some(format) = hints.format_hint.as_deref().and_then(extension_format) {
                log::debug!("content sniffing failed, retrying with format hint");
                Ok(image::load_from_memory_with_format(bytes, format)?)
            } else {
                Err(sniff_err.into())
            }
        }
    }
}

fn extension_format(ext: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(ext.trim_start_matches('.').to_lowercase())
}

fn dynamic_to_array(img: DynamicImage) -> Result<PixelArray> {
    match img {
        DynamicImage::ImageLuma8(buf) => {
            PixelArray::new(buf.width(), buf.height(), 1, buf.into_raw())
        }
        DynamicImage::ImageRgb8(buf) => {
            PixelArray::new(buf.width(), buf.height(), 3, buf.into_raw())
        }
        DynamicImage::ImageRgba8(buf) => {
            PixelArray::new(buf.width(), buf.height(), 4, buf.into_raw())
        }
        other => {
            log::debug!("converting {:?} samples to rgba8", other.color());
            let buf = other.to_rgba8();
            PixelArray::new(buf.width(), buf.height(), 4, buf.into_raw())
        }
    }
}

fn array_to_dynamic(pixels: &PixelArray) -> Result<DynamicImage> {
    let (w, h) = (pixels.width(), pixels.height());
    let data = pixels.data().to_vec();
    let img = match pixels.channels() {
        1 => image::GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => image::RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        n => return Err(Error::ChannelCount(n)),
    };
    img.ok_or(Error::BufferSize {
        expected: w as usize * h as usize * pixels.channels() as usize,
        actual: pixels.data().len(),
    })
}

// ── metadata-carrying PNG path ───────────────────────────────────────

/// Encode an image with metadata as a PNG.
///
/// One text chunk per metadata key: string values verbatim, everything else
/// as canonical JSON. Latin-1-representable text goes into a `tEXt` chunk,
/// anything wider into `iTXt`. The reserved [`PIXEL_FORMAT_KEY`] chunk is
/// written first.
pub fn immencode(image: &Image) -> Result<Vec<u8>> {
    let pixels = image.pixels();
    let color = match image.pixel_format() {
        PixelFormat::Gray => png::ColorType::Grayscale,
        PixelFormat::Rgb => png::ColorType::Rgb,
        PixelFormat::Rgba => png::ColorType::Rgba,
    };

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, pixels.width(), pixels.height());
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);

    add_text_chunk(&mut encoder, PIXEL_FORMAT_KEY, image.pixel_format().as_str())?;
    for (key, value) in image.meta() {
        let text = match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        };
        add_text_chunk(&mut encoder, key, &text)?;
    }

    let mut writer = encoder.write_header().map_err(encode_err)?;
    writer.write_image_data(pixels.data()).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    Ok(out)
}

/// Decode an image with metadata from encoded bytes.
///
/// The pixel format comes from the native color mode, never from the stored
/// [`PIXEL_FORMAT_KEY`] chunk; that chunk (and the mode itself) are dropped
/// from the returned metadata so an encode/decode pair is an identity on
/// string-valued maps. Non-PNG content falls back to the generic delegate
/// codec and carries no text metadata.
pub fn immdecode(bytes: &[u8], hints: &CodecHints) -> Result<Image> {
    if bytes.starts_with(&PNG_MAGIC) {
        immdecode_png(bytes)
    } else {
        immdecode_delegate(bytes, hints)
    }
}

/// Metadata-only probe of a PNG: header and pre-pixel text chunks, no pixel
/// decode.
///
/// The scan stops at the first IDAT chunk, so text chunks some producers
/// place after the pixel data are not seen. Files written by [`immencode`]
/// are unaffected — it emits every text chunk ahead of the pixel data.
pub fn probe_meta(bytes: &[u8]) -> Result<NativeMeta> {
    let decoder = png::Decoder::new(bytes);
    let reader = decoder.read_info().map_err(decode_err)?;
    let info = reader.info();

    let mode = mode_name(info.color_type, info.bit_depth);

    let mut texts = Vec::new();
    for chunk in &info.uncompressed_latin1_text {
        texts.push((chunk.keyword.clone(), chunk.text.clone()));
    }
    for chunk in &info.compressed_latin1_text {
        let mut chunk = chunk.clone();
        chunk.decompress_text().map_err(decode_err)?;
        texts.push((chunk.keyword.clone(), chunk.get_text().map_err(decode_err)?));
    }
    for chunk in &info.utf8_text {
        let mut chunk = chunk.clone();
        chunk.decompress_text().map_err(decode_err)?;
        texts.push((chunk.keyword.clone(), chunk.get_text().map_err(decode_err)?));
    }

    Ok(NativeMeta { mode, texts })
}

fn immdecode_png(bytes: &[u8]) -> Result<Image> {
    let native = probe_meta(bytes)?;
    let pixel_format = PixelFormat::from_native_mode(&native.mode)?;

    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info().map_err(decode_err)?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).map_err(decode_err)?;
    buf.truncate(frame.buffer_size());

    // Palette files keep their raw indices as single-channel gray samples.
    let channels = frame.color_type.samples() as u8;
    let pixels = PixelArray::new(frame.width, frame.height, channels, buf)?;

    let mut meta = Map::new();
    for (key, text) in native.texts {
        if key != PIXEL_FORMAT_KEY {
            meta.insert(key, Value::String(text));
        }
    }

    Image::new(pixels, pixel_format, meta)
}

fn immdecode_delegate(bytes: &[u8], hints: &CodecHints) -> Result<Image> {
    let img = load_dynamic(bytes, hints)?;
    let mode = match img.color() {
        image::ColorType::L8 => "L".to_string(),
        image::ColorType::Rgb8 => "RGB".to_string(),
        image::ColorType::Rgba8 => "RGBA".to_string(),
        other => format!("{other:?}"),
    };
    let pixel_format = PixelFormat::from_native_mode(&mode)?;
    let pixels = dynamic_to_array(img)?;
    Image::new(pixels, pixel_format, Map::new())
}

/// Native mode name for a PNG color type and bit depth, in the delegate
/// codec's vocabulary.
fn mode_name(color: png::ColorType, depth: png::BitDepth) -> String {
    match (color, depth) {
        (png::ColorType::Grayscale, png::BitDepth::Eight) => "L".to_string(),
        (png::ColorType::Indexed, png::BitDepth::Eight) => "P".to_string(),
        (png::ColorType::Rgb, png::BitDepth::Eight) => "RGB".to_string(),
        (png::ColorType::Rgba, png::BitDepth::Eight) => "RGBA".to_string(),
        (png::ColorType::GrayscaleAlpha, png::BitDepth::Eight) => "LA".to_string(),
        (png::ColorType::Grayscale, png::BitDepth::Sixteen) => "I;16".to_string(),
        (color, depth) => format!("{color:?};{depth:?}"),
    }
}

fn add_text_chunk<W: Write>(
    encoder: &mut png::Encoder<'_, W>,
    key: &str,
    text: &str,
) -> Result<()> {
    // tEXt is Latin-1 only; anything wider goes into iTXt (UTF-8).
    if text.chars().all(|c| (c as u32) <= 0xFF) {
        encoder
            .add_text_chunk(key.to_string(), text.to_string())
            .map_err(encode_err)
    } else {
        encoder
            .add_itxt_chunk(key.to_string(), text.to_string())
            .map_err(encode_err)
    }
}

fn encode_err(err: png::EncodingError) -> Error {
    Error::PngEncode(err.to_string())
}

fn decode_err(err: png::DecodingError) -> Error {
    Error::PngDecode(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gradient(width: u32, height: u32, channels: u8) -> PixelArray {
        let data: Vec<u8> = (0..width as usize * height as usize * channels as usize)
            .map(|i| (i * 7 % 256) as u8)
            .collect();
        PixelArray::new(width, height, channels, data).unwrap()
    }

    fn meta_of(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn string_metadata_round_trips_bit_identical() {
        for (format, channels) in [
            (PixelFormat::Gray, 1),
            (PixelFormat::Rgb, 3),
            (PixelFormat::Rgba, 4),
        ] {
            let meta = meta_of(&[
                ("lens", json!("50mm")),
                ("camera", json!("K-1000")),
            ]);
            let imm = Image::new(gradient(5, 4, channels), format, meta).unwrap();
            let decoded = immdecode(&immencode(&imm).unwrap(), &CodecHints::default()).unwrap();
            assert_eq!(decoded, imm, "round trip failed for {format}");
        }
    }

    #[test]
    fn non_string_values_come_back_as_json_strings() {
        let meta = meta_of(&[
            ("exposure", json!(1.0 / 125.0)),
            ("flash", json!(false)),
            ("crop", json!([0, 0, 5, 4])),
            ("nested", json!({"iso": 200})),
        ]);
        let imm = Image::new(gradient(5, 4, 3), PixelFormat::Rgb, meta).unwrap();
        let decoded = immdecode(&immencode(&imm).unwrap(), &CodecHints::default()).unwrap();

        assert_eq!(decoded.meta()["exposure"], json!("0.008"));
        assert_eq!(decoded.meta()["flash"], json!("false"));
        assert_eq!(decoded.meta()["crop"], json!("[0,0,5,4]"));
        assert_eq!(decoded.meta()["nested"], json!("{\"iso\":200}"));
        // Values changed type, so the images are not equal.
        assert_ne!(decoded, imm);
    }

    #[test]
    fn non_latin1_metadata_survives_via_itxt() {
        let meta = meta_of(&[("caption", json!("日本語のキャプション"))]);
        let imm = Image::new(gradient(3, 3, 1), PixelFormat::Gray, meta).unwrap();
        let decoded = immdecode(&immencode(&imm).unwrap(), &CodecHints::default()).unwrap();
        assert_eq!(decoded.meta()["caption"], json!("日本語のキャプション"));
    }

    #[test]
    fn pixel_format_always_round_trips() {
        for (format, channels) in [
            (PixelFormat::Gray, 1),
            (PixelFormat::Rgb, 3),
            (PixelFormat::Rgba, 4),
        ] {
            let imm = Image::new(gradient(4, 2, channels), format, Map::new()).unwrap();
            let decoded = immdecode(&immencode(&imm).unwrap(), &CodecHints::default()).unwrap();
            assert_eq!(decoded.pixel_format(), format);
        }
    }

    #[test]
    fn probe_reads_mode_and_texts_without_pixel_decode() {
        let meta = meta_of(&[("lens", json!("50mm"))]);
        let imm = Image::new(gradient(4, 4, 3), PixelFormat::Rgb, meta).unwrap();
        let bytes = immencode(&imm).unwrap();

        let native = probe_meta(&bytes).unwrap();
        assert_eq!(native.mode, "RGB");
        assert!(native
            .texts
            .iter()
            .any(|(k, v)| k == PIXEL_FORMAT_KEY && v == "rgb"));
        assert!(native.texts.iter().any(|(k, v)| k == "lens" && v == "50mm"));
    }

    #[test]
    fn reserved_key_is_not_surfaced_in_meta() {
        let imm = Image::new(gradient(2, 2, 3), PixelFormat::Rgb, Map::new()).unwrap();
        let decoded = immdecode(&immencode(&imm).unwrap(), &CodecHints::default()).unwrap();
        assert!(!decoded.meta().contains_key(PIXEL_FORMAT_KEY));
        assert!(decoded.meta().is_empty());
    }

    #[test]
    fn pixel_only_png_round_trip() {
        let pixels = gradient(7, 3, 3);
        let bytes = encode_pixels(&pixels, ".png").unwrap();
        let decoded = decode_pixels(&bytes, &CodecHints::default()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn extension_hint_forces_the_codec() {
        let pixels = gradient(4, 4, 3);
        let bytes = encode_pixels(&pixels, ".png").unwrap();
        let decoded = decode_pixels(&bytes, &CodecHints::with_extension(".png")).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn unknown_write_extension_is_unsupported() {
        let pixels = gradient(2, 2, 3);
        assert!(matches!(
            encode_pixels(&pixels, ".xyz"),
            Err(Error::UnsupportedFormat(ext)) if ext == ".xyz"
        ));
    }

    #[test]
    fn garbage_bytes_fail_decode() {
        assert!(decode_pixels(b"not an image", &CodecHints::default()).is_err());
    }

    #[test]
    fn sixteen_bit_gray_is_an_unsupported_mode() {
        // Encode a 16-bit grayscale PNG by hand; the metadata decoder must
        // reject its mode rather than silently quantize.
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Sixteen);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0u8; 8]).unwrap();
            writer.finish().unwrap();
        }
        assert!(matches!(
            immdecode(&bytes, &CodecHints::default()),
            Err(Error::UnsupportedPixelMode(mode)) if mode == "I;16"
        ));
    }

    #[test]
    fn compressed_text_chunks_decode_like_plain_ones() {
        // Other producers may compress their text chunks (zTXt); the probe
        // must decompress them and surface the same strings.
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder
                .add_ztxt_chunk("comment".to_string(), "squeezed".to_string())
                .unwrap();
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0u8; 4]).unwrap();
            writer.finish().unwrap();
        }

        let native = probe_meta(&bytes).unwrap();
        assert!(native
            .texts
            .iter()
            .any(|(k, v)| k == "comment" && v == "squeezed"));

        let decoded = immdecode(&bytes, &CodecHints::default()).unwrap();
        assert_eq!(decoded.meta()["comment"], json!("squeezed"));
    }

    #[test]
    fn palette_pngs_collapse_to_gray_indices() {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(vec![0, 0, 0, 255, 255, 255]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 1, 1, 0]).unwrap();
            writer.finish().unwrap();
        }

        let decoded = immdecode(&bytes, &CodecHints::default()).unwrap();
        assert_eq!(decoded.pixel_format(), PixelFormat::Gray);
        assert_eq!(decoded.pixels().channels(), 1);
        assert_eq!(decoded.pixels().data(), &[0, 1, 1, 0]);
    }
}
