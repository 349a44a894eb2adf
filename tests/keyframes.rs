use egui::pos2;
use image::RgbaImage;

use storyboard_studio::timeline::keyframe::{self, EXPAND_PAD_MS};
use storyboard_studio::timeline::ops;
use storyboard_studio::timeline::{AnimaticElement, Keyframe, TrackItem};

fn assert_near(a: egui::Pos2, b: egui::Pos2) {
    assert!((a - b).length() < 1e-3, "{a:?} != {b:?}");
}

fn sprite(start: f64, duration: f64) -> AnimaticElement {
    AnimaticElement::from_bitmap("ball", RgbaImage::new(8, 8), start, duration, pos2(0.0, 0.0))
}

#[test]
fn test_second_key_interpolates_midpoint() {
    let mut element = sprite(0.0, 2000.0);

    element.set_keyframe(1000.0, pos2(100.0, 50.0));

    assert_eq!(element.keyframes.len(), 2);
    assert_eq!(element.position_at(500.0), pos2(50.0, 25.0));
}

#[test]
fn test_exact_and_clamped_positions() {
    let mut element = sprite(1000.0, 3000.0);
    element.set_keyframe(500.0, pos2(10.0, 10.0));
    element.set_keyframe(1500.0, pos2(30.0, -10.0));

    // Absolute times; keys sit at 1000, 1500 and 2500.
    assert_eq!(element.position_at(1500.0), pos2(10.0, 10.0));
    assert_eq!(element.position_at(0.0), pos2(0.0, 0.0));
    assert_eq!(element.position_at(9000.0), pos2(30.0, -10.0));
}

#[test]
fn test_key_within_snap_window_overwrites() {
    let mut element = sprite(0.0, 2000.0);
    let first = element.set_keyframe(1000.0, pos2(1.0, 1.0));

    let second = element.set_keyframe(1000.0 + keyframe::SNAP_MS, pos2(2.0, 2.0));

    assert_eq!(first, second);
    assert_eq!(element.keyframes.len(), 2);
    assert_eq!(element.keyframes[1].value, pos2(2.0, 2.0));
    assert_eq!(element.keyframes[1].time_ms, 1000.0);
}

#[test]
fn test_keys_stay_sorted() {
    let mut element = sprite(0.0, 3000.0);
    element.set_keyframe(2000.0, pos2(2.0, 0.0));
    element.set_keyframe(1000.0, pos2(1.0, 0.0));

    let times: Vec<f64> = element.keyframes.iter().map(|k| k.time_ms).collect();
    assert_eq!(times, vec![0.0, 1000.0, 2000.0]);
}

#[test]
fn test_key_past_end_grows_duration() {
    let mut element = sprite(0.0, 1000.0);

    element.set_keyframe(2000.0, pos2(5.0, 5.0));

    assert_eq!(element.duration, 2000.0 + EXPAND_PAD_MS);
}

#[test]
fn test_last_key_cannot_be_deleted() {
    let mut element = sprite(0.0, 2000.0);
    let only = element.keyframes[0].id.clone();
    assert!(!element.delete_keyframe(&only));

    let extra = element.set_keyframe(1000.0, pos2(9.0, 9.0));
    assert!(element.delete_keyframe(&extra));
    assert_eq!(element.keyframes.len(), 1);
    assert!(!element.delete_keyframe("missing"));
}

#[test]
fn test_capture_keeps_current_position() {
    let mut element = sprite(0.0, 2000.0);
    element.set_keyframe(1000.0, pos2(100.0, 0.0));

    element.capture_keyframe(250.0);

    assert_eq!(element.keyframes.len(), 3);
    assert_near(element.position_at(250.0), pos2(25.0, 0.0));
    assert_near(element.position_at(500.0), pos2(50.0, 0.0));
}

#[test]
fn test_split_keeps_motion_continuous() {
    let mut items = vec![sprite(1000.0, 2000.0)];
    let id = items[0].id.clone();
    items[0].set_keyframe(1000.0, pos2(100.0, 0.0));
    let before = items[0].position_at(1800.0);

    let tail = ops::split(&mut items, &id, 1400.0).unwrap();

    let tail = items.iter().find(|a| a.id == tail).unwrap();
    assert_eq!(tail.start_time, 1400.0);
    assert_eq!(tail.keyframes[0].time_ms, 0.0);
    assert_near(tail.position_at(1400.0), pos2(40.0, 0.0));
    assert_near(tail.position_at(1800.0), before);
    assert_near(items[0].position_at(1400.0), pos2(40.0, 0.0));
}

#[test]
fn test_trim_start_pins_motion_to_absolute_time() {
    let mut element = sprite(0.0, 2000.0);
    element.set_keyframe(1000.0, pos2(100.0, 0.0));
    let before = element.position_at(750.0);

    ops::trim_start(&mut element, 500.0);

    assert_eq!(element.start(), 500.0);
    assert_near(element.position_at(750.0), before);
}

#[test]
fn test_free_interpolation_helper() {
    let keys = vec![Keyframe::new(0.0, pos2(0.0, 0.0)), Keyframe::new(400.0, pos2(0.0, 40.0))];
    assert_eq!(keyframe::interpolate(&keys, 100.0), Some(pos2(0.0, 10.0)));
    assert_eq!(keyframe::interpolate(&[], 100.0), None);
}
