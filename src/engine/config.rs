//! ### English
//! Player configuration with a builder for ergonomic construction.
//!
//! ```rust
//! use std::time::Duration;
//! use offscreen_effect_player::{CameraOrientation, PlayerConfig};
//!
//! let config = PlayerConfig::builder()
//!     .size(1920, 1080)
//!     .orientation(CameraOrientation::Deg90)
//!     .draw_timeout(Duration::from_secs(2))
//!     .build();
//! assert!(config.validate().is_ok());
//! ```
//!
//! ### 中文
//! 播放器配置，并提供 builder 以便构造。

use std::time::Duration;

use dpi::PhysicalSize;

use super::error::PlayerError;
use super::rendering::CameraOrientation;

/// ### English
/// Default surface size used when none is configured.
///
/// ### 中文
/// 未配置时使用的默认表面尺寸。
pub const DEFAULT_SIZE: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

/// ### English
/// How long construction waits for the worker thread to report initialization.
///
/// ### 中文
/// 构造时等待工作线程报告初始化结果的时长。
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// ### English
/// Configuration for [`crate::OffscreenEffectPlayer`].
///
/// Use [`PlayerConfig::builder()`] or struct literal syntax with [`Default::default()`].
///
/// ### 中文
/// [`crate::OffscreenEffectPlayer`] 的配置。
///
/// 可使用 [`PlayerConfig::builder()`]，或结构体字面量配合 [`Default::default()`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// ### English
    /// Render surface size in physical pixels (both dimensions must be non-zero).
    ///
    /// ### 中文
    /// 渲染表面尺寸（物理像素，宽高都必须非 0）。
    pub size: PhysicalSize<u32>,
    /// ### English
    /// Rotation applied by the post-process pass after each draw.
    ///
    /// ### 中文
    /// 每次绘制后由后处理 pass 应用的旋转。
    pub orientation: CameraOrientation,
    /// ### English
    /// Whether the post-process pass flips the image vertically (default `true`: GL read-back
    /// is bottom-up).
    ///
    /// ### 中文
    /// 后处理 pass 是否做垂直翻转（默认 `true`：GL 读回是自下而上的）。
    pub flip_y: bool,
    /// ### English
    /// Maximum wait for the worker thread to initialize the render target and engine surface.
    ///
    /// ### 中文
    /// 等待工作线程初始化渲染目标与引擎 surface 的最长时间。
    pub init_timeout: Duration,
    /// ### English
    /// Optional bound on the engine draw-completion poll. `None` waits indefinitely.
    ///
    /// ### 中文
    /// 引擎绘制完成轮询的可选上限。`None` 表示无限等待。
    pub draw_timeout: Option<Duration>,
    /// ### English
    /// Name given to the worker thread.
    ///
    /// ### 中文
    /// 工作线程的名称。
    pub worker_name: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            orientation: CameraOrientation::Deg0,
            flip_y: true,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            draw_timeout: None,
            worker_name: "offscreen-effect-player".to_string(),
        }
    }
}

impl PlayerConfig {
    /// ### English
    /// Creates a builder starting from the defaults.
    ///
    /// ### 中文
    /// 从默认值开始创建一个 builder。
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// ### English
    /// Checks the configuration before a worker thread is spawned for it.
    ///
    /// ### 中文
    /// 在为该配置创建工作线程之前进行校验。
    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "surface size must be non-zero, got {}x{}",
                self.size.width, self.size.height
            )));
        }
        if self.init_timeout.is_zero() {
            return Err(PlayerError::InvalidConfig(
                "init_timeout must be non-zero".to_string(),
            ));
        }
        if self.worker_name.is_empty() || self.worker_name.contains('\0') {
            return Err(PlayerError::InvalidConfig(
                "worker_name must be a non-empty string without NUL bytes".to_string(),
            ));
        }
        Ok(())
    }
}

/// ### English
/// Builder for [`PlayerConfig`].
///
/// ### 中文
/// [`PlayerConfig`] 的 builder。
#[derive(Debug, Clone, Default)]
pub struct PlayerConfigBuilder {
    config: PlayerConfig,
}

impl PlayerConfigBuilder {
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.config.size = PhysicalSize::new(width, height);
        self
    }

    pub fn orientation(mut self, orientation: CameraOrientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn flip_y(mut self, flip_y: bool) -> Self {
        self.config.flip_y = flip_y;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    pub fn draw_timeout(mut self, timeout: Duration) -> Self {
        self.config.draw_timeout = Some(timeout);
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    pub fn build(self) -> PlayerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_gl_readback() {
        let config = PlayerConfig::default();
        assert_eq!(config.size, DEFAULT_SIZE);
        assert_eq!(config.orientation, CameraOrientation::Deg0);
        assert!(config.flip_y);
        assert!(config.draw_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = PlayerConfig::builder()
            .size(640, 480)
            .orientation(CameraOrientation::Deg270)
            .flip_y(false)
            .draw_timeout(Duration::from_millis(250))
            .worker_name("oep-test")
            .build();

        assert_eq!(config.size, PhysicalSize::new(640, 480));
        assert_eq!(config.orientation, CameraOrientation::Deg270);
        assert!(!config.flip_y);
        assert_eq!(config.draw_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.worker_name, "oep-test");
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let config = PlayerConfig::builder().size(0, 720).build();
        assert!(matches!(
            config.validate(),
            Err(PlayerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_worker_name() {
        let config = PlayerConfig::builder().worker_name("").build();
        assert!(config.validate().is_err());
    }
}
