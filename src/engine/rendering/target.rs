//! ### English
//! Render target contract and orientation math.
//!
//! ### 中文
//! 渲染目标契约与方向变换计算。

use dpi::PhysicalSize;

use crate::engine::error::RenderTargetError;

/// ### English
/// Camera rotation applied after the engine draws, in clockwise quarter turns.
///
/// ### 中文
/// 引擎绘制后施加的相机旋转，以顺时针 90° 为单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraOrientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl CameraOrientation {
    #[inline]
    pub fn quarter_turns(self) -> usize {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 1,
            Self::Deg180 => 2,
            Self::Deg270 => 3,
        }
    }

    /// ### English
    /// Whether orienting with `flip_y` needs a GPU pass. Only `Deg0` without a flip is free.
    ///
    /// ### 中文
    /// 以 `flip_y` 进行方向变换时是否需要一次 GPU pass。只有 `Deg0` 且不翻转时可以跳过。
    #[inline]
    pub fn requires_pass(self, flip_y: bool) -> bool {
        self != Self::Deg0 || flip_y
    }
}

/// ### English
/// Texture corners in counter-clockwise order starting bottom-left.
///
/// ### 中文
/// 纹理四角，从左下开始按逆时针排列。
const CORNERS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// ### English
/// Texture coordinates of a full-screen quad drawn as a triangle strip
/// (bottom-left, bottom-right, top-left, top-right).
///
/// Output corner `i` samples source corner `i + quarter_turns`, which turns the image clockwise.
/// `flip_y` mirrors the sampled `v` afterwards.
///
/// ### 中文
/// 以 triangle strip 绘制的全屏四边形（左下、右下、左上、右上）的纹理坐标。
///
/// 输出角 `i` 采样源角 `i + quarter_turns`，即顺时针旋转图像；`flip_y` 随后镜像 `v`。
pub(crate) fn quad_tex_coords(orientation: CameraOrientation, flip_y: bool) -> [[f32; 2]; 4] {
    let turns = orientation.quarter_turns();
    let at = |corner: usize| {
        let [u, v] = CORNERS[(corner + turns) % 4];
        if flip_y { [u, 1.0 - v] } else { [u, v] }
    };
    [at(0), at(1), at(3), at(2)]
}

/// ### English
/// Offscreen GPU surface the effect engine draws into.
///
/// Every method runs on the player's worker thread only; implementations are moved there once at
/// construction, hence `Send`.
///
/// ### 中文
/// 特效引擎绘制的离屏 GPU 表面。
///
/// 所有方法都只在播放器工作线程上调用；实现会在构造时被移动到该线程一次，因此要求 `Send`。
pub trait RenderTarget: Send {
    /// ### English
    /// Creates the GPU context and the resources that do not depend on the first frame.
    /// Errors are fatal for the player.
    ///
    /// ### 中文
    /// 创建 GPU 上下文以及不依赖首帧的资源。出错即播放器构造失败。
    fn init(&mut self) -> Result<(), RenderTargetError>;

    fn activate_context(&mut self) -> Result<(), RenderTargetError>;

    /// ### English
    /// Binds the draw framebuffer (allocating its texture lazily) and validates completeness.
    ///
    /// ### 中文
    /// 绑定绘制用 framebuffer（按需分配纹理）并检查完整性。
    fn prepare_rendering(&mut self) -> Result<(), RenderTargetError>;

    /// ### English
    /// Applies `orientation` and an optional vertical flip to the last draw.
    ///
    /// ### 中文
    /// 对上一次绘制结果施加 `orientation` 与可选的垂直翻转。
    fn orient_image(
        &mut self,
        orientation: CameraOrientation,
        is_y_flip: bool,
    ) -> Result<(), RenderTargetError>;

    /// ### English
    /// Reads the latest output back as tightly packed RGBA (`width * height * 4` bytes).
    ///
    /// ### 中文
    /// 以紧密排列的 RGBA（`width * height * 4` 字节）读回最新输出。
    fn read_current_buffer(&mut self) -> Result<Vec<u8>, RenderTargetError>;

    fn size(&self) -> PhysicalSize<u32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_without_flip_is_free() {
        assert!(!CameraOrientation::Deg0.requires_pass(false));
        assert!(CameraOrientation::Deg0.requires_pass(true));
        assert!(CameraOrientation::Deg270.requires_pass(false));
        assert_eq!(
            quad_tex_coords(CameraOrientation::Deg0, false),
            [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]
        );
    }

    #[test]
    fn test_flip_mirrors_v() {
        assert_eq!(
            quad_tex_coords(CameraOrientation::Deg0, true),
            [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]]
        );
    }

    #[test]
    fn test_quarter_turns_rotate_corners() {
        // Bottom-left of the output samples the source's bottom-right.
        assert_eq!(quad_tex_coords(CameraOrientation::Deg90, false)[0], [1.0, 0.0]);
        assert_eq!(
            quad_tex_coords(CameraOrientation::Deg180, false),
            [[1.0, 1.0], [0.0, 1.0], [1.0, 0.0], [0.0, 0.0]]
        );
        assert_eq!(quad_tex_coords(CameraOrientation::Deg270, false)[0], [0.0, 1.0]);
    }

    #[test]
    fn test_half_turn_with_flip_is_horizontal_mirror() {
        assert_eq!(
            quad_tex_coords(CameraOrientation::Deg180, true),
            [[1.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
        );
    }
}
