mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use offscreen_effect_player::{
    CameraOrientation, OffscreenEffectPlayer, PixelBuffer, PixelFormat, PlayerConfig, PlayerError,
    RenderTargetError,
};

use common::{
    FILL, MockOptions, WAIT, barrier, block_worker, rgba_frame, small_config, start, start_with,
    try_start,
};

fn deliver(player: &OffscreenEffectPlayer) -> PixelBuffer {
    let (tx, rx) = channel::bounded(1);
    player
        .process_image_async(rgba_frame(player.size()), move |buffer| {
            let _ = tx.send(buffer);
        })
        .unwrap();
    rx.recv_timeout(WAIT).unwrap()
}

#[test]
fn test_init_runs_on_named_worker_thread() {
    let (player, recorder) = start(small_config());
    assert_eq!(recorder.init_thread.lock().unwrap().as_deref(), Some("fx-worker"));
    assert_eq!(recorder.log(), vec!["surface 4x2".to_string()]);
    assert_eq!(player.size(), PhysicalSize::new(4, 2));
}

#[test]
fn test_init_failure_is_fatal() {
    let (player, recorder) = try_start(
        small_config(),
        MockOptions {
            fail_init: true,
            ..MockOptions::default()
        },
    );
    assert!(matches!(
        player,
        Err(PlayerError::RenderTarget(RenderTargetError::FunctionLoading(_)))
    ));
    assert!(recorder.log().is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PlayerConfig {
        size: PhysicalSize::new(0, 720),
        ..PlayerConfig::default()
    };
    let (player, recorder) = try_start(config, MockOptions::default());
    assert!(matches!(player, Err(PlayerError::InvalidConfig(_))));
    assert!(recorder.init_thread.lock().unwrap().is_none());
}

#[test]
fn test_frame_delivered_on_worker_thread() {
    let (player, recorder) = start(small_config());
    let (tx, rx) = channel::bounded(1);
    player
        .process_image_async(rgba_frame(PhysicalSize::new(4, 2)), move |buffer| {
            let name = thread::current().name().map(str::to_string);
            let _ = tx.send((buffer, name));
        })
        .unwrap();

    let (buffer, name) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(name.as_deref(), Some("fx-worker"));
    assert_eq!((buffer.width(), buffer.height()), (4, 2));
    assert!(buffer.is_valid());
    assert_eq!(recorder.pushes.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.draws.load(Ordering::SeqCst), 1);
}

#[test]
fn test_held_buffer_blocks_next_frame() {
    let (player, recorder) = start(small_config());
    let buffer = deliver(&player);

    let result = player.process_image_async(rgba_frame(player.size()), |_| {
        panic!("busy submission must not call back");
    });
    assert!(matches!(result, Err(PlayerError::ResourceBusy)));
    barrier(&player);
    assert_eq!(recorder.draws.load(Ordering::SeqCst), 1);

    drop(buffer);
    let next = deliver(&player);
    assert_eq!(next.id().generation(), 2);
    assert_eq!(recorder.draws.load(Ordering::SeqCst), 2);
}

#[test]
fn test_pending_frame_blocks_next_frame() {
    let (player, recorder) = start(small_config());
    let gate = block_worker(&player);

    let (tx, rx) = channel::bounded(1);
    player
        .process_image_async(rgba_frame(player.size()), move |buffer| {
            let _ = tx.send(buffer);
        })
        .unwrap();
    assert!(matches!(
        player.process_image_async(rgba_frame(player.size()), |_| {}),
        Err(PlayerError::ResourceBusy)
    ));

    drop(gate);
    let buffer = rx.recv_timeout(WAIT).unwrap();
    assert!(buffer.is_valid());
    assert_eq!(recorder.pushes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_effect_loads_run_in_submission_order() {
    let (player, recorder) = start(small_config());
    player.load_effect("effects/a").unwrap();
    player.load_effect("effects/b").unwrap();
    player.unload_effect().unwrap();
    player.load_effect("effects/c").unwrap();
    barrier(&player);

    assert_eq!(
        recorder.log(),
        vec![
            "surface 4x2".to_string(),
            "load effects/a".to_string(),
            "load effects/b".to_string(),
            "load ".to_string(),
            "load effects/c".to_string(),
        ]
    );
}

#[test]
fn test_read_current_buffer_returns_full_rgba() {
    let (player, _recorder) = start(small_config());
    let _buffer = deliver(&player);
    let pixels = player.read_current_buffer_blocking(WAIT).unwrap();
    assert_eq!(pixels.len(), 4 * 2 * 4);
    assert!(pixels.iter().all(|&b| b == FILL));
}

#[test]
fn test_pixel_buffer_conversions() {
    let (player, _recorder) = start(small_config());
    let buffer = deliver(&player);

    let rgba = buffer.get_rgba_blocking(WAIT).unwrap();
    assert_eq!(rgba.format(), PixelFormat::Rgba);
    assert_eq!(rgba.plane(0).unwrap().len(), 4 * 2 * 4);

    let nv12 = buffer.get_nv12_blocking(WAIT).unwrap();
    assert_eq!(nv12.format(), PixelFormat::Nv12);
    assert_eq!(nv12.plane(0).unwrap().len(), 8);
    assert!(nv12.plane(0).unwrap().iter().all(|&y| y == 235));
    assert_eq!(nv12.plane(1).unwrap().len(), 2 * 1 * 2);

    // Read-backs release their own lock.
    assert!(!buffer.is_locked());
}

#[test]
fn test_dropped_handle_delivers_none() {
    let (player, _recorder) = start(small_config());
    let buffer = deliver(&player);

    let gate = block_worker(&player);
    let (tx, rx) = channel::bounded(1);
    buffer.get_rgba(move |frame| {
        let _ = tx.send(frame);
    });
    drop(buffer);
    drop(gate);

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
}

#[test]
fn test_blocking_read_refused_on_worker_thread() {
    let (player, _recorder) = start(small_config());
    let (tx, rx) = channel::bounded(1);
    player
        .process_image_async(rgba_frame(player.size()), move |buffer| {
            let _ = tx.send(buffer.get_rgba_blocking(Duration::from_secs(1)));
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
}

#[test]
fn test_destroyed_player_never_runs_queued_read() {
    let (player, _recorder) = start(small_config());
    let gate = block_worker(&player);

    let called = Arc::new(AtomicBool::new(false));
    let called_in_task = called.clone();
    player
        .read_current_buffer(move |_| called_in_task.store(true, Ordering::SeqCst))
        .unwrap();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        drop(gate);
    });
    drop(player);
    releaser.join().unwrap();

    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn test_drop_lets_started_draw_finish() {
    let (player, recorder) = start(small_config());
    recorder.stall_draw.store(true, Ordering::SeqCst);

    let (tx, rx) = channel::bounded(1);
    player
        .process_image_async(rgba_frame(player.size()), move |buffer| {
            let _ = tx.send(buffer);
        })
        .unwrap();

    let deadline = Instant::now() + WAIT;
    while recorder.pushes.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "draw never started");
        thread::sleep(Duration::from_millis(1));
    }

    let stalled = recorder.clone();
    let unstaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stalled.stall_draw.store(false, Ordering::SeqCst);
    });
    drop(player);
    unstaller.join().unwrap();

    assert_eq!(recorder.draws.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.orientations.lock().unwrap().len(), 1);
    let buffer = rx.try_recv().expect("started draw should deliver");
    assert!(!buffer.is_valid());
}

#[test]
fn test_buffer_outliving_player_is_inert() {
    let (player, _recorder) = start(small_config());
    let buffer = deliver(&player);
    drop(player);

    assert!(!buffer.is_valid());
    assert!(!buffer.lock());
    assert_eq!(buffer.get_rgba_blocking(Duration::from_millis(50)), None);
}

#[test]
fn test_call_js_method_without_effect() {
    let (player, _recorder) = start_with(
        small_config(),
        MockOptions {
            with_manager: false,
            ..MockOptions::default()
        },
    );
    assert!(matches!(
        player.call_js_method("setColor", "{}"),
        Err(PlayerError::EffectManagerUnavailable)
    ));

    let (player, recorder) = start(small_config());
    assert!(matches!(
        player.call_js_method("setColor", "{}"),
        Err(PlayerError::EffectNotLoaded)
    ));

    player.load_effect("effects/a").unwrap();
    barrier(&player);
    player.call_js_method("setColor", r#"{"r":1}"#).unwrap();
    assert!(recorder.log().contains(&r#"js effects/a:setColor({"r":1})"#.to_string()));
}

#[test]
fn test_control_calls_bypass_the_queue() {
    let (player, recorder) = start(small_config());
    let gate = block_worker(&player);

    player.pause();
    assert!(recorder.paused.load(Ordering::SeqCst));
    player.enable_audio(true);
    assert!(recorder.audio.load(Ordering::SeqCst));
    player.resume();
    assert!(!recorder.paused.load(Ordering::SeqCst));

    drop(gate);
}

#[test]
fn test_lock_protocol() {
    let (player, _recorder) = start(small_config());
    let buffer = deliver(&player);

    assert!(!buffer.is_locked());
    assert!(buffer.lock());
    assert!(buffer.is_locked());
    buffer.unlock();
    assert!(!buffer.is_locked());

    buffer.lock();
    drop(buffer);
    let next = deliver(&player);
    assert!(!next.is_locked());
}

#[test]
fn test_draw_timeout_releases_slot() {
    let config = PlayerConfig {
        draw_timeout: Some(Duration::from_millis(20)),
        ..small_config()
    };
    let (player, recorder) = start(config);
    recorder.stall_draw.store(true, Ordering::SeqCst);

    player
        .process_image_async(rgba_frame(player.size()), |_| {
            panic!("timed out draw must not call back");
        })
        .unwrap();
    barrier(&player);
    assert_eq!(recorder.pushes.load(Ordering::SeqCst), 1);

    recorder.stall_draw.store(false, Ordering::SeqCst);
    let buffer = deliver(&player);
    assert!(buffer.is_valid());
}

#[test]
fn test_incomplete_framebuffer_aborts_draw() {
    let (player, recorder) = start_with(
        small_config(),
        MockOptions {
            fail_prepare: true,
            ..MockOptions::default()
        },
    );

    for _ in 0..2 {
        player
            .process_image_async(rgba_frame(player.size()), |_| {
                panic!("aborted draw must not call back");
            })
            .unwrap();
        barrier(&player);
    }
    assert_eq!(recorder.pushes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shut_down_player_rejects_work() {
    let (mut player, _recorder) = start(small_config());
    player.shutdown();
    player.shutdown();

    assert!(player.is_shut_down());
    assert!(matches!(
        player.process_image_async(rgba_frame(player.size()), |_| {}),
        Err(PlayerError::ShutDown)
    ));
    assert!(matches!(player.load_effect("a"), Err(PlayerError::ShutDown)));
    assert!(matches!(
        player.read_current_buffer(|_| {}),
        Err(PlayerError::ShutDown)
    ));
    assert_eq!(player.read_current_buffer_blocking(WAIT), None);
}

#[test]
fn test_orientation_reaches_render_target() {
    let config = PlayerConfig {
        orientation: CameraOrientation::Deg90,
        flip_y: false,
        ..small_config()
    };
    let (player, recorder) = start(config);
    drop(deliver(&player));
    assert_eq!(
        *recorder.orientations.lock().unwrap(),
        vec![(CameraOrientation::Deg90, false)]
    );
    assert_eq!(recorder.passes.load(Ordering::SeqCst), 1);

    let config = PlayerConfig {
        flip_y: false,
        ..small_config()
    };
    let (player, recorder) = start(config);
    drop(deliver(&player));
    assert_eq!(recorder.passes.load(Ordering::SeqCst), 0);
}
