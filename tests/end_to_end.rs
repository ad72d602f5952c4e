//! Full load → redact → save → reset cycle against a real folder.

use std::fs;

use image::{Rgba, RgbaImage};
use redactfe::io::decode_image;
use redactfe::{
    EditSession, FsGateway, ImagePoint, PersistenceGateway, Rect, SessionError, SessionState,
};
use tempfile::{TempDir, tempdir};

/// A 300×200 gradient so every pixel differs from its neighbours.
fn gradient() -> RgbaImage {
    RgbaImage::from_fn(300, 200, |x, y| {
        Rgba([(x % 256) as u8, (y * 251 % 256) as u8, ((x * 7 + y * 3) % 256) as u8, 255])
    })
}

fn folder_with_png() -> (TempDir, FsGateway) {
    let dir = tempdir().unwrap();
    gradient().save(dir.path().join("car.png")).unwrap();
    let gw = FsGateway::new(dir.path());
    (dir, gw)
}

#[test]
fn redaction_stays_inside_the_selection() {
    let (_dir, gw) = folder_with_png();
    let mut session = EditSession::default();
    session.load(&gw, "car.png").unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let original = session.buffer().unwrap().clone();
    let rect = Rect::new(50, 50, 100, 60);
    assert_eq!(session.apply_mosaic(rect).unwrap(), rect);
    assert!(session.is_dirty());
    assert_eq!(session.state(), SessionState::Editing);

    let edited = session.buffer().unwrap();
    let mut changed_inside = 0;
    for (x, y, px) in edited.enumerate_pixels() {
        let inside = (50..150).contains(&x) && (50..110).contains(&y);
        if inside {
            if px != original.get_pixel(x, y) {
                changed_inside += 1;
            }
        } else {
            assert_eq!(px, original.get_pixel(x, y), "pixel ({}, {}) leaked", x, y);
        }
    }
    assert!(changed_inside > 0);

    session.reset().unwrap();
    assert_eq!(session.buffer().unwrap(), &original);
    assert!(!session.is_dirty());
}

#[test]
fn drag_in_display_space_redacts_the_mapped_region() {
    let (_dir, gw) = folder_with_png();
    let mut session = EditSession::default();
    session.load(&gw, "car.png").unwrap();

    // Canvas shown at half size, offset by (20, 10).
    let bounds = redactfe::DisplayRect::new(20.0, 10.0, 150.0, 100.0);
    let start = redactfe::geometry::map_pointer(95.0, 65.0, bounds, 300, 200).unwrap();
    let end = redactfe::geometry::map_pointer(45.0, 35.0, bounds, 300, 200).unwrap();
    assert_eq!(start, ImagePoint::new(150.0, 110.0));

    let rect = redactfe::geometry::select(start, end, 5).unwrap();
    assert_eq!(rect, Rect::new(50, 50, 100, 60));
    session.apply_mosaic(rect).unwrap();
    assert!(session.is_dirty());
}

#[test]
fn save_overwrites_with_jpeg_and_becomes_the_new_origin() {
    let (dir, gw) = folder_with_png();
    let mut session = EditSession::default();
    session.load(&gw, "car.png").unwrap();
    session.apply_mosaic(Rect::new(50, 50, 100, 60)).unwrap();
    session.export(&gw).unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.is_dirty());

    let bytes = fs::read(dir.path().join("car.png")).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    let saved = decode_image(&bytes).unwrap();
    assert_eq!(saved.dimensions(), (300, 200));
    assert_eq!(session.buffer().unwrap(), &saved);

    // Further edits are discarded back to the saved file, not the PNG.
    session.apply_mosaic(Rect::new(0, 0, 40, 40)).unwrap();
    session.reset().unwrap();
    assert_eq!(session.buffer().unwrap(), &saved);

    // Nothing but the image itself is left in the folder.
    assert_eq!(gw.list_assets().unwrap(), vec!["car.png"]);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn failed_fetch_leaves_an_empty_session() {
    let (_dir, gw) = folder_with_png();
    let mut session = EditSession::default();
    session.load(&gw, "car.png").unwrap();

    let err = session.load(&gw, "missing.jpg").unwrap_err();
    assert!(matches!(err, SessionError::LoadFailed(_)));
    assert_eq!(session.state(), SessionState::Empty);
    assert!(session.buffer().is_none());
    assert!(session.asset().is_none());
    assert!(matches!(
        session.apply_mosaic(Rect::new(0, 0, 50, 50)),
        Err(SessionError::InvalidState(SessionState::Empty))
    ));
}

#[test]
fn tiny_drag_changes_nothing() {
    let (_dir, gw) = folder_with_png();
    let mut session = EditSession::default();
    session.load(&gw, "car.png").unwrap();
    let before = session.buffer().unwrap().clone();

    let err = session.apply_mosaic(Rect::new(10, 10, 3, 2)).unwrap_err();
    assert_eq!(err, SessionError::NegligibleSelection { width: 3, height: 2 });
    assert!(err.is_benign());
    assert!(!session.is_dirty());
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.buffer().unwrap(), &before);
}
