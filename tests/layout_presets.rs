use photobooth::{LayoutId, select_layout};

const ALL: [&str; 5] = ["3x2", "4x1", "2x2", "2x1", "1x1"];

#[test]
fn cell_arithmetic_closes_over_the_canvas() {
    for name in ALL {
        let p = select_layout(name);
        let w = f64::from(p.cols) * p.cell_width()
            + f64::from(p.left_border_px)
            + f64::from(p.right_border_px);
        let h = f64::from(p.rows) * p.cell_height() + f64::from(p.bottom_border_px);
        assert!((w - f64::from(p.pixel_width)).abs() < 1e-6, "{name}");
        assert!((h - f64::from(p.pixel_height)).abs() < 1e-6, "{name}");
    }
}

#[test]
fn every_cell_lies_inside_the_canvas() {
    for name in ALL {
        let p = select_layout(name);
        for slot in 0..p.frames_per_strip() {
            let r = p.cell_rect(slot);
            assert!(r.x0 >= 0.0 && r.y0 >= 0.0, "{name} slot {slot}");
            assert!(
                r.x1 <= f64::from(p.pixel_width) + 1e-6,
                "{name} slot {slot}"
            );
            assert!(
                r.y1 <= f64::from(p.pixel_height - p.bottom_border_px) + 1e-6,
                "{name} slot {slot}"
            );
        }
    }
}

#[test]
fn cells_do_not_overlap() {
    let p = select_layout("3x2");
    for a in 0..p.frames_per_strip() {
        for b in (a + 1)..p.frames_per_strip() {
            let ra = p.cell_rect(a);
            let rb = p.cell_rect(b);
            let ix = ra.intersect(rb);
            assert!(
                ix.width() <= 1e-6 || ix.height() <= 1e-6,
                "cells {a} and {b} overlap"
            );
        }
    }
}

#[test]
fn frame_count_matches_grid() {
    assert_eq!(select_layout("3x2").frames_per_strip(), 6);
    assert_eq!(select_layout("4x1").frames_per_strip(), 4);
    assert_eq!(select_layout("2x2").frames_per_strip(), 4);
    assert_eq!(select_layout("2x1").frames_per_strip(), 2);
    assert_eq!(select_layout("1x1").frames_per_strip(), 1);
}

#[test]
fn unknown_id_falls_back_without_failing() {
    let p = select_layout("not-a-layout");
    assert_eq!(p.id, LayoutId::ThreeByTwo);
}
