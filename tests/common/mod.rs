#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

use certmaker::config::Config;
use certmaker::state::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// A solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width, height, Rgba([240, 230, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// In-memory state with uploads in a fresh temp dir. Keep the dir alive
/// for the duration of the test.
pub fn app_state() -> (Arc<AppState>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::local(dir.path(), Some(ADMIN_TOKEN));
    (Arc::new(AppState::in_memory(config)), dir)
}
