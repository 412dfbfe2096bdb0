//! ### English
//! Frame data model shared by the processing path and the preview path.
//!
//! A [`Frame`] is immutable once constructed. Plane storage is `bytes::Bytes`, so handing a
//! frame to the worker thread or copying it into a relay slot never copies pixels.
//!
//! ### 中文
//! 处理路径与预览路径共用的帧数据模型。
//!
//! [`Frame`] 构造后不可变。平面数据使用 `bytes::Bytes` 存储，因此把帧交给工作线程或
//! 拷贝进中继槽位时都不会复制像素。

use bytes::Bytes;
use dpi::PhysicalSize;

use super::error::FrameError;

/// ### English
/// Pixel layout tag of a [`Frame`].
///
/// ### 中文
/// [`Frame`] 的像素布局标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// ### English
    /// YUV 4:2:0 with three separate planes (Y, U, V), aka I420.
    ///
    /// ### 中文
    /// YUV 4:2:0，三个独立平面（Y、U、V），即 I420。
    Yuv420Planar,
    /// ### English
    /// YUV 4:2:0 with a Y plane and an interleaved UV plane.
    ///
    /// ### 中文
    /// YUV 4:2:0，一个 Y 平面加一个交错 UV 平面。
    Nv12,
    /// ### English
    /// Packed 8-bit RGBA, one plane.
    ///
    /// ### 中文
    /// 打包的 8 位 RGBA，单平面。
    Rgba,
}

impl PixelFormat {
    /// ### English
    /// Number of planes this format carries.
    ///
    /// ### 中文
    /// 该格式包含的平面数量。
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420Planar => 3,
            Self::Nv12 => 2,
            Self::Rgba => 1,
        }
    }

    /// ### English
    /// Minimum byte length of plane `index` for a frame of `size`.
    ///
    /// ### 中文
    /// 尺寸为 `size` 的帧中第 `index` 个平面的最小字节长度。
    pub fn plane_len(self, size: PhysicalSize<u32>, index: usize) -> usize {
        let w = size.width as usize;
        let h = size.height as usize;
        let chroma = w.div_ceil(2) * h.div_ceil(2);
        match (self, index) {
            (Self::Rgba, _) => w * h * 4,
            (Self::Nv12, 0) | (Self::Yuv420Planar, 0) => w * h,
            (Self::Nv12, _) => chroma * 2,
            (Self::Yuv420Planar, _) => chroma,
        }
    }
}

/// ### English
/// One video frame: size, pixel format and plane data.
///
/// ### 中文
/// 一帧视频：尺寸、像素格式与平面数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    size: PhysicalSize<u32>,
    format: PixelFormat,
    planes: Vec<Bytes>,
}

impl Frame {
    /// ### English
    /// Builds a frame after checking dimensions, plane count and plane lengths.
    ///
    /// Planes may be longer than required (e.g. padded strides are not modelled, trailing
    /// bytes are ignored), never shorter.
    ///
    /// ### 中文
    /// 校验尺寸、平面数量与平面长度后构造一帧。
    ///
    /// 平面可以比要求的更长（尾部多余字节会被忽略），但不能更短。
    pub fn new(
        size: PhysicalSize<u32>,
        format: PixelFormat,
        planes: Vec<Bytes>,
    ) -> Result<Self, FrameError> {
        if size.width == 0 || size.height == 0 {
            return Err(FrameError::EmptyDimensions {
                width: size.width,
                height: size.height,
            });
        }

        let expected = format.plane_count();
        if planes.len() != expected {
            return Err(FrameError::PlaneCount {
                format,
                expected,
                actual: planes.len(),
            });
        }

        for (index, plane) in planes.iter().enumerate() {
            let expected = format.plane_len(size, index);
            if plane.len() < expected {
                return Err(FrameError::PlaneTooSmall {
                    index,
                    expected,
                    actual: plane.len(),
                });
            }
        }

        Ok(Self {
            size,
            format,
            planes,
        })
    }

    /// ### English
    /// Builds a packed RGBA frame.
    ///
    /// ### 中文
    /// 构造一帧打包 RGBA 帧。
    pub fn rgba(size: PhysicalSize<u32>, data: impl Into<Bytes>) -> Result<Self, FrameError> {
        Self::new(size, PixelFormat::Rgba, vec![data.into()])
    }

    /// ### English
    /// Builds an NV12 frame from its Y and interleaved UV planes.
    ///
    /// ### 中文
    /// 由 Y 平面与交错 UV 平面构造一帧 NV12。
    pub fn nv12(
        size: PhysicalSize<u32>,
        y_plane: impl Into<Bytes>,
        uv_plane: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        Self::new(size, PixelFormat::Nv12, vec![y_plane.into(), uv_plane.into()])
    }

    /// ### English
    /// Builds an I420 frame from its Y, U and V planes.
    ///
    /// ### 中文
    /// 由 Y、U、V 三个平面构造一帧 I420。
    pub fn yuv420(
        size: PhysicalSize<u32>,
        y_plane: impl Into<Bytes>,
        u_plane: impl Into<Bytes>,
        v_plane: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        Self::new(
            size,
            PixelFormat::Yuv420Planar,
            vec![y_plane.into(), u_plane.into(), v_plane.into()],
        )
    }

    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn planes(&self) -> &[Bytes] {
        &self.planes
    }

    /// ### English
    /// Returns plane `index`, if the format has it.
    ///
    /// ### 中文
    /// 返回第 `index` 个平面（若该格式存在此平面）。
    #[inline]
    pub fn plane(&self, index: usize) -> Option<&Bytes> {
        self.planes.get(index)
    }

    /// ### English
    /// Consumes the frame and returns its planes.
    ///
    /// ### 中文
    /// 消耗该帧并返回其平面数据。
    pub fn into_planes(self) -> Vec<Bytes> {
        self.planes
    }
}
