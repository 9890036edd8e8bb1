use std::sync::Arc;

use chrono::NaiveDate;
use photobooth::{
    AssetRegistry, CaptureSession, Compositor, PreparedImage, RenderSettings, Surface,
    select_layout,
    session::{STRIP_FILENAME, TickContext},
};

fn fixed_now() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(14, 7, 9)
        .unwrap()
}

fn camera_frame() -> PreparedImage {
    PreparedImage {
        width: 32,
        height: 24,
        rgba8_premul: Arc::new(vec![180u8; 32 * 24 * 4]),
    }
}

#[test]
fn two_by_two_one_second_countdown_fills_four_cells_and_downloads() {
    let layout = select_layout("2x2");
    let mut session = CaptureSession::new(layout, 1).unwrap();
    let mut compositor = Compositor::new();
    let mut registry = AssetRegistry::new("assets");
    let settings = RenderSettings::default();
    let overlay = Surface::new(32, 24);
    let camera = camera_frame();

    session
        .start(&mut compositor, &registry, &settings)
        .unwrap();

    let idle_centers: Vec<_> = (0..4)
        .map(|slot| {
            let r = layout.cell_rect(slot);
            let (x, y) = (((r.x0 + r.x1) / 2.0) as u32, ((r.y0 + r.y1) / 2.0) as u32);
            (x, y, session.strip().pixel(x, y).unwrap())
        })
        .collect();

    let mut captured = Vec::new();
    let mut complete_events = 0;
    let mut exported = None;
    let out_dir = std::path::PathBuf::from("target").join("session_flow_strip");

    for tick in 0..32 {
        let mut ctx = TickContext {
            compositor: &mut compositor,
            registry: &mut registry,
            settings: &settings,
            overlay: &overlay,
            camera_frame: Some(&camera),
            elapsed_sec: f64::from(tick),
            now: fixed_now(),
        };
        let event = session.tick(&mut ctx).unwrap();
        if let Some(slot) = event.captured_slot {
            captured.push(slot);
        }
        if event.strip_complete {
            complete_events += 1;
            exported = Some(session.export_strip(&out_dir).unwrap());
        }
        if event.start_available {
            break;
        }
    }

    // One arming tick, then four capture ticks back to back.
    assert_eq!(captured, vec![0, 1, 2, 3]);
    assert_eq!(session.state().frames_captured, 4);
    assert_eq!(complete_events, 1);
    assert!(!session.is_running());

    // Every cell center changed from the idle grid to captured video.
    for (x, y, idle_px) in idle_centers {
        let px = session.strip().pixel(x, y).unwrap();
        assert_ne!(px, idle_px, "cell center ({x},{y}) was not filled");
        assert_eq!(px[3], 255);
    }

    let path = exported.expect("strip was exported");
    assert!(path.ends_with(STRIP_FILENAME));
    let decoded = image::open(&path).unwrap();
    assert_eq!(decoded.width(), layout.pixel_width);
    assert_eq!(decoded.height(), layout.pixel_height);
}

#[test]
fn capture_composite_reads_one_settings_snapshot() {
    // The whole per-frame composite happens inside a single synchronous
    // tick call; mutating settings between ticks must only affect later
    // frames. Capture slot 0 with a red border, slot 1 with a blue one,
    // and check the decoration redraw tracked the snapshot of its tick.
    let layout = select_layout("2x1");
    let mut session = CaptureSession::new(layout, 1).unwrap();
    let mut compositor = Compositor::new();
    let mut registry = AssetRegistry::new("assets");
    let overlay = Surface::new(32, 24);
    let camera = camera_frame();

    let mut settings = RenderSettings::default();
    settings.border_color = photobooth::Rgba8::opaque(200, 0, 0);

    session
        .start(&mut compositor, &registry, &settings)
        .unwrap();

    let mut run_tick = |session: &mut CaptureSession,
                        compositor: &mut Compositor,
                        registry: &mut AssetRegistry,
                        settings: &RenderSettings| {
        let mut ctx = TickContext {
            compositor,
            registry,
            settings,
            overlay: &overlay,
            camera_frame: Some(&camera),
            elapsed_sec: 0.0,
            now: fixed_now(),
        };
        session.tick(&mut ctx).unwrap()
    };

    // Arm, then capture slot 0 under the red snapshot.
    run_tick(&mut session, &mut compositor, &mut registry, &settings);
    let e = run_tick(&mut session, &mut compositor, &mut registry, &settings);
    assert_eq!(e.captured_slot, Some(0));
    assert_eq!(session.strip().pixel(2, 2), Some([200, 0, 0, 255]));

    // Recolor between ticks; the next capture redraws decoration blue.
    settings.border_color = photobooth::Rgba8::opaque(0, 0, 200);
    let e = run_tick(&mut session, &mut compositor, &mut registry, &settings);
    assert_eq!(e.captured_slot, Some(1));
    assert_eq!(session.strip().pixel(2, 2), Some([0, 0, 200, 255]));
}
