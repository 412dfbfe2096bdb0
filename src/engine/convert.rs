//! ### English
//! Pixel format conversion of read-back frames.
//!
//! Conversion runs on the worker thread right after a GPU read-back. The default
//! [`Bt601Converter`] is a reference CPU implementation; embedders with a faster path (SIMD,
//! shader-based) plug in their own [`PixelFormatConverter`].
//!
//! ### 中文
//! 读回帧的像素格式转换。
//!
//! 转换在 GPU 读回之后立即于工作线程执行。默认的 [`Bt601Converter`] 是参考性的 CPU 实现；
//! 有更快路径（SIMD、着色器）的宿主可以接入自己的 [`PixelFormatConverter`]。

use bytes::Bytes;

use super::frame::{Frame, PixelFormat};

/// ### English
/// Converts a frame into another pixel format.
///
/// Returns `None` for conversions the implementation does not support.
///
/// ### 中文
/// 把一帧转换为另一种像素格式。
///
/// 对不支持的转换返回 `None`。
pub trait PixelFormatConverter: Send {
    fn convert(&mut self, source: &Frame, target: PixelFormat) -> Option<Frame>;
}

/// ### English
/// CPU converter using the BT.601 limited-range matrix.
///
/// Supports RGBA passthrough and RGBA → NV12 (chroma averaged over each 2×2 block).
///
/// ### 中文
/// 使用 BT.601 有限范围矩阵的 CPU 转换器。
///
/// 支持 RGBA 直通与 RGBA → NV12（色度按 2×2 块取平均）。
#[derive(Debug, Default, Clone, Copy)]
pub struct Bt601Converter;

impl PixelFormatConverter for Bt601Converter {
    fn convert(&mut self, source: &Frame, target: PixelFormat) -> Option<Frame> {
        match (source.format(), target) {
            (PixelFormat::Rgba, PixelFormat::Rgba) => Some(source.clone()),
            (PixelFormat::Rgba, PixelFormat::Nv12) => {
                let rgba = source.plane(0)?;
                let (y, uv) = rgba_to_nv12(rgba, source.width(), source.height());
                Frame::nv12(source.size(), y, uv).ok()
            }
            _ => None,
        }
    }
}

/// ### English
/// Converts packed RGBA into NV12 planes `(y, uv)`.
///
/// Uses BT.601 (limited range):
/// Y = 0.257R + 0.504G + 0.098B + 16
/// U = -0.148R - 0.291G + 0.439B + 128
/// V = 0.439R - 0.368G - 0.071B + 128
///
/// ### 中文
/// 把打包 RGBA 转换为 NV12 平面 `(y, uv)`。
fn rgba_to_nv12(src: &[u8], width: u32, height: u32) -> (Bytes, Bytes) {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    let mut y_plane = vec![0u8; w * h];
    let mut uv_plane = vec![0u8; cw * ch * 2];

    for row in 0..h {
        for col in 0..w {
            let px = (row * w + col) * 4;
            let (r, g, b) = (src[px] as i32, src[px + 1] as i32, src[px + 2] as i32);
            y_plane[row * w + col] = luma(r, g, b);
        }
    }

    for crow in 0..ch {
        for ccol in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for row in (crow * 2)..((crow * 2 + 2).min(h)) {
                for col in (ccol * 2)..((ccol * 2 + 2).min(w)) {
                    let px = (row * w + col) * 4;
                    r += src[px] as i32;
                    g += src[px + 1] as i32;
                    b += src[px + 2] as i32;
                    n += 1;
                }
            }
            let (u, v) = chroma(r / n, g / n, b / n);
            let at = (crow * cw + ccol) * 2;
            uv_plane[at] = u;
            uv_plane[at + 1] = v;
        }
    }

    (Bytes::from(y_plane), Bytes::from(uv_plane))
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8
}

#[inline]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
}
