//! Mock engine and render target shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use offscreen_effect_player::{
    Bt601Converter, CameraOrientation, Effect, EffectEngine, EffectManager, EngineControl, Frame,
    OffscreenEffectPlayer, PlayerConfig, PlayerError, PlayerInit, RenderTarget,
    RenderTargetError,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Byte written to every channel by `MockRenderTarget::read_current_buffer`.
pub const FILL: u8 = 255;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Everything the mocks observe, shared with the test body.
#[derive(Default)]
pub struct Recorder {
    pub log: Mutex<Vec<String>>,
    pub init_thread: Mutex<Option<String>>,
    pub pushes: AtomicUsize,
    pub draws: AtomicUsize,
    pub passes: AtomicUsize,
    pub orientations: Mutex<Vec<(CameraOrientation, bool)>>,
    pub stall_draw: AtomicBool,
    pub paused: AtomicBool,
    pub audio: AtomicBool,
}

impl Recorder {
    pub fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

pub struct MockEffect {
    recorder: Arc<Recorder>,
    path: String,
}

impl Effect for MockEffect {
    fn call_js_method(&self, method: &str, params: &str) {
        self.recorder
            .record(format!("js {}:{method}({params})", self.path));
    }
}

pub struct MockManager {
    recorder: Arc<Recorder>,
    current: Mutex<Option<Arc<MockEffect>>>,
}

impl EffectManager for MockManager {
    fn load(&self, path: &str) {
        self.recorder.record(format!("load {path}"));
        let effect = (!path.is_empty()).then(|| {
            Arc::new(MockEffect {
                recorder: self.recorder.clone(),
                path: path.to_string(),
            })
        });
        *self.current.lock().unwrap() = effect;
    }

    fn current(&self) -> Option<Arc<dyn Effect>> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .map(|effect| effect as Arc<dyn Effect>)
    }
}

pub struct MockControl {
    recorder: Arc<Recorder>,
    manager: Option<Arc<MockManager>>,
}

impl EngineControl for MockControl {
    fn playback_pause(&self) {
        self.recorder.paused.store(true, Ordering::SeqCst);
    }

    fn playback_play(&self) {
        self.recorder.paused.store(false, Ordering::SeqCst);
    }

    fn enable_audio(&self, enable: bool) {
        self.recorder.audio.store(enable, Ordering::SeqCst);
    }

    fn effect_manager(&self) -> Option<Arc<dyn EffectManager>> {
        self.manager
            .clone()
            .map(|manager| manager as Arc<dyn EffectManager>)
    }
}

pub struct MockEngine {
    recorder: Arc<Recorder>,
    control: Arc<MockControl>,
}

impl EffectEngine for MockEngine {
    fn surface_created(&mut self, size: PhysicalSize<u32>) {
        self.recorder
            .record(format!("surface {}x{}", size.width, size.height));
    }

    fn push_frame(&mut self, _frame: Frame) {
        self.recorder.pushes.fetch_add(1, Ordering::SeqCst);
    }

    fn draw(&mut self) -> i64 {
        if self.recorder.stall_draw.load(Ordering::SeqCst) {
            return -1;
        }
        self.recorder.draws.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn control(&self) -> Arc<dyn EngineControl> {
        self.control.clone()
    }
}

/// Counts orientation passes with `CameraOrientation::requires_pass`, so it checks what the worker
/// forwards, not the GL pass itself. `GlRenderTarget`'s own skip decision is unit-tested in
/// `gl_target.rs`.
pub struct MockRenderTarget {
    recorder: Arc<Recorder>,
    size: PhysicalSize<u32>,
    fail_init: bool,
    fail_prepare: bool,
}

impl RenderTarget for MockRenderTarget {
    fn init(&mut self) -> Result<(), RenderTargetError> {
        *self.recorder.init_thread.lock().unwrap() = thread::current().name().map(str::to_string);
        if self.fail_init {
            return Err(RenderTargetError::FunctionLoading(
                "glReadPixels is not available".to_string(),
            ));
        }
        Ok(())
    }

    fn activate_context(&mut self) -> Result<(), RenderTargetError> {
        Ok(())
    }

    fn prepare_rendering(&mut self) -> Result<(), RenderTargetError> {
        if self.fail_prepare {
            return Err(RenderTargetError::IncompleteFramebuffer(0x8CD6));
        }
        Ok(())
    }

    fn orient_image(
        &mut self,
        orientation: CameraOrientation,
        is_y_flip: bool,
    ) -> Result<(), RenderTargetError> {
        self.recorder
            .orientations
            .lock()
            .unwrap()
            .push((orientation, is_y_flip));
        if orientation.requires_pass(is_y_flip) {
            self.recorder.passes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn read_current_buffer(&mut self) -> Result<Vec<u8>, RenderTargetError> {
        Ok(vec![
            FILL;
            self.size.width as usize * self.size.height as usize * 4
        ])
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }
}

pub struct MockOptions {
    pub fail_init: bool,
    pub fail_prepare: bool,
    pub with_manager: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            fail_init: false,
            fail_prepare: false,
            with_manager: true,
        }
    }
}

pub fn try_start(
    config: PlayerConfig,
    options: MockOptions,
) -> (Result<OffscreenEffectPlayer, PlayerError>, Arc<Recorder>) {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let manager = options.with_manager.then(|| {
        Arc::new(MockManager {
            recorder: recorder.clone(),
            current: Mutex::new(None),
        })
    });
    let engine = MockEngine {
        recorder: recorder.clone(),
        control: Arc::new(MockControl {
            recorder: recorder.clone(),
            manager,
        }),
    };
    let render_target = MockRenderTarget {
        recorder: recorder.clone(),
        size: config.size,
        fail_init: options.fail_init,
        fail_prepare: options.fail_prepare,
    };

    let player = OffscreenEffectPlayer::new(PlayerInit {
        config,
        engine: Box::new(engine),
        render_target: Box::new(render_target),
        converter: Box::new(Bt601Converter),
    });
    (player, recorder)
}

pub fn start(config: PlayerConfig) -> (OffscreenEffectPlayer, Arc<Recorder>) {
    start_with(config, MockOptions::default())
}

pub fn start_with(
    config: PlayerConfig,
    options: MockOptions,
) -> (OffscreenEffectPlayer, Arc<Recorder>) {
    let (player, recorder) = try_start(config, options);
    (player.expect("player should start"), recorder)
}

pub fn small_config() -> PlayerConfig {
    PlayerConfig::builder()
        .size(4, 2)
        .worker_name("fx-worker")
        .build()
}

pub fn rgba_frame(size: PhysicalSize<u32>) -> Frame {
    Frame::rgba(size, vec![0u8; (size.width * size.height * 4) as usize]).unwrap()
}

/// Occupies the worker with a read-back callback until the returned gate is dropped.
pub fn block_worker(player: &OffscreenEffectPlayer) -> channel::Sender<()> {
    let (gate_tx, gate_rx) = channel::bounded::<()>(0);
    let (entered_tx, entered_rx) = channel::bounded(1);
    player
        .read_current_buffer(move |_| {
            let _ = entered_tx.send(());
            let _ = gate_rx.recv();
        })
        .unwrap();
    entered_rx.recv_timeout(WAIT).unwrap();
    gate_tx
}

/// Waits until every task queued so far has run.
pub fn barrier(player: &OffscreenEffectPlayer) {
    player
        .read_current_buffer_blocking(WAIT)
        .expect("worker should answer");
}
