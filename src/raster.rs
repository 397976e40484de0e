//! Read one band of a remote GeoTIFF and re-save it locally as a
//! single-band, uint16, LZW-compressed GeoTIFF with the source's
//! georeferencing carried over.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use std::time::Duration;

use log::debug;
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray16;
use tiff::encoder::compression::Lzw;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::FetchError;
use crate::signing::SignedAssetRef;

const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Georeferencing and encoding metadata copied from a source raster.
///
/// The output invariant (exactly 1 band, unsigned 16-bit samples, LZW
/// compression) is not stored here; `write_geotiff` forces it regardless of
/// the source's native encoding.
#[derive(Debug, Clone, Default)]
pub struct RasterProfile {
    pub width: u32,
    pub height: u32,
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoints: Option<Vec<f64>>,
    pub model_transformation: Option<Vec<f64>>,
    pub geo_key_directory: Option<Vec<u16>>,
    pub geo_double_params: Option<Vec<f64>>,
    pub geo_ascii_params: Option<String>,
    pub nodata: Option<String>,
}

impl RasterProfile {
    fn from_decoder<R: Read + Seek>(
        decoder: &mut Decoder<R>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            width,
            height,
            pixel_scale: tag_f64_vec(decoder, Tag::ModelPixelScaleTag),
            tiepoints: tag_f64_vec(decoder, Tag::ModelTiepointTag),
            model_transformation: tag_f64_vec(decoder, Tag::ModelTransformationTag),
            geo_key_directory: tag_u16_vec(decoder, Tag::GeoKeyDirectoryTag),
            geo_double_params: tag_f64_vec(decoder, Tag::GeoDoubleParamsTag),
            geo_ascii_params: tag_string(decoder, Tag::GeoAsciiParamsTag),
            nodata: tag_string(decoder, Tag::GdalNodata),
        }
    }
}

fn tag_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<Vec<f64>> {
    let value = decoder.find_tag(tag).ok().flatten()?;
    value.into_f64_vec().ok()
}

fn tag_u16_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<Vec<u16>> {
    let value = decoder.find_tag(tag).ok().flatten()?;
    let values = value.into_u32_vec().ok()?;
    Some(values.into_iter().map(|v| v as u16).collect())
}

fn tag_string<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<String> {
    let value = decoder.find_tag(tag).ok().flatten()?;
    let text = value.into_string().ok()?;
    // ASCII tag payloads are NUL-terminated on disk
    Some(text.trim_end_matches('\0').to_string())
}

/// Decode the first band of a single-band TIFF into a 2-D uint16 array,
/// along with its profile. The decoder handle is dropped on every exit path.
pub fn read_band<R: Read + Seek>(reader: R) -> Result<(Array2<u16>, RasterProfile), FetchError> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;

    match decoder.colortype()? {
        ColorType::Gray(8) | ColorType::Gray(16) => {}
        other => {
            return Err(FetchError::UnsupportedPixelFormat(format!(
                "expected a single-band grayscale raster, got {:?}",
                other
            )))
        }
    }

    let profile = RasterProfile::from_decoder(&mut decoder, width, height);

    let pixels: Vec<u16> = match decoder.read_image()? {
        DecodingResult::U16(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(u16::from).collect(),
        other => {
            return Err(FetchError::UnsupportedPixelFormat(format!(
                "sample format not representable as uint16: {:?}",
                sample_kind(&other)
            )))
        }
    };

    let array = Array2::from_shape_vec((height as usize, width as usize), pixels)
        .map_err(|e| FetchError::UnsupportedPixelFormat(e.to_string()))?;

    Ok((array, profile))
}

fn sample_kind(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "u8",
        DecodingResult::U16(_) => "u16",
        DecodingResult::U32(_) => "u32",
        DecodingResult::U64(_) => "u64",
        DecodingResult::I8(_) => "i8",
        DecodingResult::I16(_) => "i16",
        DecodingResult::I32(_) => "i32",
        DecodingResult::I64(_) => "i64",
        DecodingResult::F32(_) => "f32",
        DecodingResult::F64(_) => "f64",
    }
}

/// Write the array as a single-band uint16 LZW GeoTIFF, carrying over the
/// profile's georeferencing tags. The file handle is closed on every exit
/// path.
pub fn write_geotiff(
    path: &Path,
    array: &Array2<u16>,
    profile: &RasterProfile,
) -> Result<(), FetchError> {
    let mut writer = BufWriter::new(File::create(path)?);
    {
        let mut encoder = TiffEncoder::new(&mut writer)?;
        let mut image = encoder.new_image_with_compression::<Gray16, Lzw>(
            profile.width,
            profile.height,
            Lzw::default(),
        )?;

        if let Some(scale) = &profile.pixel_scale {
            image.encoder().write_tag(Tag::ModelPixelScaleTag, scale.as_slice())?;
        }
        if let Some(tiepoints) = &profile.tiepoints {
            image.encoder().write_tag(Tag::ModelTiepointTag, tiepoints.as_slice())?;
        }
        if let Some(transformation) = &profile.model_transformation {
            image
                .encoder()
                .write_tag(Tag::ModelTransformationTag, transformation.as_slice())?;
        }
        if let Some(geo_keys) = &profile.geo_key_directory {
            image.encoder().write_tag(Tag::GeoKeyDirectoryTag, geo_keys.as_slice())?;
        }
        if let Some(doubles) = &profile.geo_double_params {
            image.encoder().write_tag(Tag::GeoDoubleParamsTag, doubles.as_slice())?;
        }
        if let Some(ascii) = &profile.geo_ascii_params {
            image.encoder().write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
        }
        if let Some(nodata) = &profile.nodata {
            image.encoder().write_tag(Tag::GdalNodata, nodata.as_str())?;
        }

        let data = array.as_slice().ok_or_else(|| {
            FetchError::UnsupportedPixelFormat("pixel array is not contiguous".to_string())
        })?;
        image.write_data(data)?;
    }
    // The encoder never flushes the writer; an implicit drop would swallow
    // a failed final flush and leave a truncated file reported as written.
    writer.flush()?;

    Ok(())
}

/// Download the signed asset into memory.
pub async fn fetch(
    client: &reqwest::Client,
    asset: &SignedAssetRef,
) -> Result<Vec<u8>, FetchError> {
    let bytes = client
        .get(asset.url.clone())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    debug!("fetched {} bytes for item {}", bytes.len(), asset.item_id);
    Ok(bytes.to_vec())
}

/// Fetch one band behind a signed URL and persist it at `path` with the
/// output invariant applied.
pub async fn fetch_and_write(
    client: &reqwest::Client,
    asset: &SignedAssetRef,
    path: &Path,
) -> Result<(), FetchError> {
    let bytes = fetch(client, asset).await?;
    let (array, profile) = read_band(Cursor::new(bytes))?;
    write_geotiff(path, &array, &profile)
}
