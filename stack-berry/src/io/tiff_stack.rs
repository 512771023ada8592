//! 多页 TIFF 栈的读写. 每一页对应一个 z 平面.

use super::imagej::{format_description, ImageJDescription};
use crate::{BitDepth, Calibration, LabelDepth, LabelVolume, StackError, StackResult};
use crate::{VolumeAttr, VolumeImage};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::{ResolutionUnit, Tag};
use tiff::{ColorType, TiffError, TiffResult};

/// 读取 3D TIFF 栈. 标题为文件名.
///
/// # 错误
///
/// - 文件无法打开: `StackError::Io`;
/// - 不是合法 TIFF: `StackError::Tiff`;
/// - 不是 8/16-bit 灰度: `StackError::UnsupportedSampleFormat`;
/// - 各页尺寸或位深不一致: `StackError::InconsistentPlanes`;
/// - 少于两页: `StackError::NotAStack`.
pub fn read_stack<P: AsRef<Path>>(path: P) -> StackResult<VolumeImage> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| StackError::Io {
        path: path.to_owned(),
        source,
    })?;
    let tiff_err = |source| StackError::Tiff {
        path: path.to_owned(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let color = decoder.colortype().map_err(tiff_err)?;
    let depth = match color {
        ColorType::Gray(8) => BitDepth::Eight,
        ColorType::Gray(16) => BitDepth::Sixteen,
        other => {
            return Err(StackError::UnsupportedSampleFormat {
                path: path.to_owned(),
                found: format!("{other:?}"),
            })
        }
    };
    let calibration = read_calibration(&mut decoder, path);

    let plane_len = width as usize * height as usize;
    let mut buf: Vec<u16> = Vec::with_capacity(plane_len);
    let mut planes = 0usize;
    loop {
        let same_layout = decoder.dimensions().map_err(tiff_err)? == (width, height)
            && decoder.colortype().map_err(tiff_err)? == color;
        if !same_layout {
            return Err(StackError::InconsistentPlanes {
                path: path.to_owned(),
                plane: planes,
            });
        }

        let before = buf.len();
        match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::U8(v) => buf.extend(v.into_iter().map(u16::from)),
            DecodingResult::U16(v) => buf.extend(v),
            _ => {
                return Err(StackError::UnsupportedSampleFormat {
                    path: path.to_owned(),
                    found: format!("{color:?} (非无符号整数)"),
                })
            }
        }
        if buf.len() - before != plane_len {
            return Err(StackError::InconsistentPlanes {
                path: path.to_owned(),
                plane: planes,
            });
        }
        planes += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err)?;
    }

    if planes < 2 {
        return Err(StackError::NotAStack {
            path: path.to_owned(),
            planes,
        });
    }

    // 每页长度都已检查, 该操作不会生成 `Err`, 可直接 unwrap.
    let data = Array3::from_shape_vec((planes, height as usize, width as usize), buf).unwrap();

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(VolumeImage::new(title, depth, data).with_calibration(calibration))
}

/// 从当前 (第一个) IFD 读取分辨率标签和 ImageJ 描述, 组合为定标信息.
///
/// 缺失或异常的元数据不会导致错误, 相应分量保持默认值.
fn read_calibration<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Calibration {
    let pixel_size = |decoder: &mut Decoder<R>, tag: Tag| match decoder.find_tag(tag) {
        Ok(Some(Value::Rational(n, d))) if n != 0 && d != 0 => Some(d as f64 / n as f64),
        _ => None,
    };
    let x = pixel_size(decoder, Tag::XResolution);
    let y = pixel_size(decoder, Tag::YResolution);

    let description = match decoder.find_tag(Tag::ImageDescription) {
        Ok(Some(Value::Ascii(text))) => ImageJDescription::parse(&text),
        _ => None,
    };
    let Some(description) = description else {
        return Calibration::new(x.unwrap_or(1.0), y.unwrap_or(1.0), 1.0, "pixel");
    };
    if description.is_hyperstack() {
        log::warn!(
            "'{}' 是多通道/多帧超栈, 所有页都将被视为 z 平面",
            path.display()
        );
    }

    let Some(unit) = description.unit else {
        return Calibration::new(x.unwrap_or(1.0), y.unwrap_or(1.0), 1.0, "pixel");
    };
    Calibration::new(
        x.unwrap_or(1.0),
        y.or(x).unwrap_or(1.0),
        description.spacing.unwrap_or(1.0),
        unit,
    )
}

/// 像素尺寸 -> 分辨率 (每单位像素数).
fn resolution_of(pixel_size: f64) -> Rational {
    const SCALE: f64 = 1_000_000.0;
    let d = (pixel_size * SCALE).round().clamp(1.0, u32::MAX as f64) as u32;
    Rational {
        n: SCALE as u32,
        d,
    }
}

/// 逐页写出 `$volume`, 元素经 `$convert` 转为 `$color` 的样本类型.
/// 第一页附带 ImageJ 描述, 每页附带分辨率.
macro_rules! encode_pages {
    ($encoder: expr, $volume: expr, $color: ty, $convert: expr, $description: expr) => {{
        let (_, h, w) = $volume.shape();
        let cal = $volume.calibration();
        for (z, sli) in $volume.slice_iter().enumerate() {
            let buf: Vec<_> = sli.iter().map(|p| $convert(*p)).collect();
            let mut image = $encoder.new_image::<$color>(w as u32, h as u32)?;
            if z == 0 {
                image
                    .encoder()
                    .write_tag(Tag::ImageDescription, $description)?;
            }
            image.resolution_unit(ResolutionUnit::None);
            image.x_resolution(resolution_of(cal.x));
            image.y_resolution(resolution_of(cal.y));
            image.write_data(&buf)?;
        }
    }};
}

fn encode_labels<W: Write + Seek>(encoder: &mut TiffEncoder<W>, labels: &LabelVolume) -> TiffResult<()> {
    let description = format_description(
        labels.len_z(),
        labels.calibration(),
        labels.max_label() as f64,
    );
    let description = description.as_str();
    match labels.label_depth() {
        LabelDepth::Eight => encode_pages!(
            encoder,
            labels,
            colortype::Gray8,
            |l: u32| l.min(u8::MAX as u32) as u8,
            description
        ),
        LabelDepth::Sixteen => encode_pages!(
            encoder,
            labels,
            colortype::Gray16,
            |l: u32| l.min(u16::MAX as u32) as u16,
            description
        ),
        LabelDepth::ThirtyTwo => {
            encode_pages!(encoder, labels, colortype::Gray32, |l: u32| l, description)
        }
    }
    Ok(())
}

fn encode_volume<W: Write + Seek>(encoder: &mut TiffEncoder<W>, volume: &VolumeImage) -> TiffResult<()> {
    let description = format_description(
        volume.len_z(),
        volume.calibration(),
        volume.bit_depth().max_value() as f64,
    );
    let description = description.as_str();
    match volume.bit_depth() {
        BitDepth::Eight => encode_pages!(
            encoder,
            volume,
            colortype::Gray8,
            |p: u16| p.min(u8::MAX as u16) as u8,
            description
        ),
        BitDepth::Sixteen => {
            encode_pages!(encoder, volume, colortype::Gray16, |p: u16| p, description)
        }
    }
    Ok(())
}

/// 打开 `path` 并用 `op` 写出. 文件已存在时直接覆盖.
fn write_with<F>(path: &Path, op: F) -> StackResult<()>
where
    F: FnOnce(&mut TiffEncoder<BufWriter<File>>) -> TiffResult<()>,
{
    let file = File::create(path).map_err(|source| StackError::Io {
        path: path.to_owned(),
        source,
    })?;
    let tiff_err = |source: TiffError| StackError::TiffWrite {
        path: path.to_owned(),
        source,
    };
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_err)?;
    op(&mut encoder).map_err(tiff_err)
}

/// 将标签体写为多页 TIFF. 样本位深由 `labels.label_depth()` 决定.
pub fn write_labels<P: AsRef<Path>>(path: P, labels: &LabelVolume) -> StackResult<()> {
    write_with(path.as_ref(), |encoder| encode_labels(encoder, labels))
}

/// 将灰度体数据写为多页 TIFF.
pub fn write_volume<P: AsRef<Path>>(path: P, volume: &VolumeImage) -> StackResult<()> {
    write_with(path.as_ref(), |encoder| encode_volume(encoder, volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_write_read_calibrated_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.tif");

        let data = Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 1000 + y * 10 + x) as u16);
        let volume = VolumeImage::new("ignored", BitDepth::Sixteen, data.clone())
            .with_calibration(Calibration::new(0.25, 0.25, 2.0, "micron"));
        write_volume(&path, &volume).unwrap();

        let back = read_stack(&path).unwrap();
        assert_eq!(back.title(), "cells.tif");
        assert_eq!(back.bit_depth(), BitDepth::Sixteen);
        assert_eq!(back.data(), data.view());
        let cal = back.calibration();
        assert!((cal.x - 0.25).abs() < 1e-6);
        assert!((cal.y - 0.25).abs() < 1e-6);
        assert_eq!(cal.z, 2.0);
        assert_eq!(cal.unit, "micron");
    }

    #[test]
    fn test_labels_written_with_label_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells_mask.tif");

        let mut data = Array3::zeros((2, 3, 3));
        data[(1, 1, 1)] = 300u32;
        let labels = LabelVolume::new(data, LabelDepth::Sixteen);
        write_labels(&path, &labels).unwrap();

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.colortype().unwrap(), ColorType::Gray(16));
        assert!(decoder.more_images());

        let back = read_stack(&path).unwrap();
        assert_eq!(back[(1, 1, 1)], 300);
        assert_eq!(back.data().iter().filter(|p| **p != 0).count(), 1);
    }

    #[test]
    fn test_single_plane_is_not_a_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray8>(4, 4, &[7u8; 16])
            .unwrap();

        let err = read_stack(&path).unwrap_err();
        assert!(matches!(err, StackError::NotAStack { planes: 1, .. }));
        assert!(err.is_unsupported_input());
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();

        let err = read_stack(&path).unwrap_err();
        assert!(err.is_unsupported_input());
    }

    #[test]
    fn test_truncated_stack_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full.tif");
        let data = Array3::from_shape_fn((3, 16, 16), |(z, y, x)| (z + y + x) as u16);
        write_volume(&full, &VolumeImage::new("full", BitDepth::Eight, data)).unwrap();

        let bytes = std::fs::read(&full).unwrap();
        let cut = dir.path().join("cut.tif");
        std::fs::write(&cut, &bytes[..bytes.len() / 2]).unwrap();
        let err = read_stack(&cut).unwrap_err();
        assert!(err.is_unsupported_input(), "{err}");

        let tiny = dir.path().join("tiny.tif");
        std::fs::write(&tiny, b"II").unwrap();
        let err = read_stack(&tiny).unwrap_err();
        assert!(err.is_unsupported_input(), "{err}");
    }

    #[test]
    fn test_missing_file_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_stack(dir.path().join("absent.tif")).unwrap_err();
        assert!(matches!(err, StackError::Io { .. }));
        assert!(!err.is_unsupported_input());
    }

    #[test]
    fn test_rgb_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        for _ in 0..2 {
            encoder
                .write_image::<colortype::RGB8>(2, 2, &[0u8; 12])
                .unwrap();
        }

        let err = read_stack(&path).unwrap_err();
        assert!(matches!(err, StackError::UnsupportedSampleFormat { .. }));
    }
}
