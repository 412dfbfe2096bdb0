//! ### English
//! Player runtime (public API): the player, its worker thread and pixel-buffer handles.
//!
//! ### 中文
//! 播放器运行时（对外公开 API）：播放器、其工作线程以及像素缓冲句柄。

mod pixel_buffer;
mod player;
mod slots;
mod worker;

pub use pixel_buffer::PixelBuffer;
pub use player::{OffscreenEffectPlayer, PlayerInit};
pub use slots::BufferId;
