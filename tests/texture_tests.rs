use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tessera_engine::error::EngineError;
use tessera_engine::game_core::{LogReporter, MemoryAssets};
use tessera_engine::gpu::headless::{GpuCall, HeadlessDriver};
use tessera_engine::gpu::{Filter, Wrap};
use tessera_engine::graphics::{Graphics, Screen};
use tessera_engine::pixmap::Pixmap;
use tessera_engine::scene::{Gizmo, Image};
use tessera_engine::texture::TextureKey;

fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

fn graphics_with(assets: MemoryAssets) -> (Graphics, tessera_engine::gpu::headless::HeadlessHandle) {
    Graphics::headless_with(
        HeadlessDriver::new(),
        Arc::new(assets),
        Arc::new(LogReporter),
        Screen::new(200, 100),
    )
}

#[test]
fn solid_textures_are_shared_by_color() {
    let (mut gfx, _handle) = Graphics::headless(200, 100);
    let a = gfx.textures.create_solid(0xFFFF0000);
    let b = gfx.textures.create_solid(0xFFFF0000);
    let c = gfx.textures.create_solid(0xFF0000FF);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(gfx.textures.len(), 2);
    assert_eq!(a.pixmap().pixel(0, 0), 0xFFFF0000);
}

#[test]
fn gradient_has_one_texel_per_color() {
    let (mut gfx, _handle) = Graphics::headless(200, 100);
    let colors = [0xFF000000, 0xFF808080, 0xFFFFFFFF];
    let gradient = gfx.textures.create_gradient(&colors);
    assert_eq!(gradient.width(), 3);
    assert_eq!(gradient.height(), 1);
    assert_eq!(gradient.filter_mode(), Filter::Linear);
    assert_eq!(gradient.pixmap().pixel(1, 0), 0xFF808080);
    assert!(Arc::ptr_eq(&gradient, &gfx.textures.create_gradient(&colors)));
}

#[test]
fn named_textures_keep_their_first_size() {
    let (mut gfx, _handle) = Graphics::headless(200, 100);
    let first = gfx.textures.create("fog", 8, 4);
    let again = gfx.textures.create("fog", 64, 64);
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!((again.width(), again.height()), (8, 4));
}

#[test]
fn assets_are_decoded_once() {
    let assets = MemoryAssets::new();
    assets.insert("tiles.png", png(4, 2, [255, 0, 0, 255]));
    let (mut gfx, _handle) = graphics_with(assets);

    let tiles = gfx.texture("tiles.png").unwrap();
    assert_eq!((tiles.width(), tiles.height()), (4, 2));
    assert_eq!(tiles.pixmap().pixel(3, 1), 0xFFFF0000);
    assert!(Arc::ptr_eq(&tiles, &gfx.texture("tiles.png").unwrap()));
    assert!(gfx.textures.contains(&TextureKey::Asset("tiles.png".to_string())));
}

#[test]
fn missing_and_corrupt_assets_are_errors() {
    let assets = MemoryAssets::new();
    assets.insert("broken.png", b"not an image".to_vec());
    let (mut gfx, _handle) = graphics_with(assets);

    assert!(matches!(gfx.texture("absent.png"), Err(EngineError::Asset { .. })));
    assert!(matches!(gfx.texture("broken.png"), Err(EngineError::Decode { .. })));
    assert!(gfx.textures.is_empty());
}

#[test]
fn pixel_buffers_are_keyed_by_identity() {
    let (mut gfx, _handle) = Graphics::headless(200, 100);
    let pixmap = Arc::new(Pixmap::new(2, 2));
    let a = gfx.texture(pixmap.clone()).unwrap();
    let b = gfx.texture(pixmap.clone()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let copy = (*pixmap).clone();
    let c = gfx.texture(copy).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn live_texture_passes_through_unregistered() {
    let (mut gfx, _handle) = Graphics::headless(200, 100);
    let texture = Arc::new(tessera_engine::Texture::new(Pixmap::solid(0xFFFFFFFF)));
    let resolved = gfx.texture(texture.clone()).unwrap();
    assert!(Arc::ptr_eq(&texture, &resolved));
    assert!(gfx.textures.is_empty());
}

#[test]
fn handle_is_generated_on_first_bind() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let texture = gfx.textures.create("canvas", 16, 16);
    assert!(!texture.is_generated());
    assert!(handle.calls().is_empty());

    gfx.bind_texture(&texture);
    assert!(texture.is_generated());
    let calls = handle.calls();
    assert!(matches!(calls[0], GpuCall::GenTexture(_)));
    assert!(calls.contains(&GpuCall::TexImage { width: 16, height: 16 }));
    assert!(calls.contains(&GpuCall::TexFilter(Filter::Linear, Filter::Linear)));
    assert!(calls.contains(&GpuCall::TexWrap(Wrap::Clamp, Wrap::Clamp)));
}

#[test]
fn parameter_changes_apply_on_next_bind() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let texture = gfx.textures.create_solid(0xFF00FF00);
    gfx.bind_texture(&texture);
    handle.clear_calls();

    texture.set_wrap(Wrap::Repeat);
    texture.set_image(Pixmap::new(3, 3));
    gfx.bind_texture(&texture);

    let calls = handle.calls();
    assert!(calls.contains(&GpuCall::TexImage { width: 3, height: 3 }));
    assert!(calls.contains(&GpuCall::TexWrap(Wrap::Repeat, Wrap::Repeat)));
    assert!(!calls.iter().any(|c| matches!(c, GpuCall::GenTexture(_))));
}

#[test]
fn clear_deletes_every_handle() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let a = gfx.textures.create_solid(0xFF000001);
    let b = gfx.textures.create_solid(0xFF000002);
    gfx.bind_texture(&a);
    gfx.bind_texture(&b);
    assert_eq!(handle.live_textures(), 2);

    gfx.clear_textures();
    assert_eq!(handle.live_textures(), 0);
    assert!(gfx.textures.is_empty());
    assert!(!a.is_generated());
    assert_eq!(gfx.gpu().bound_texture(), None);
}

#[test]
fn solid_after_clear_is_a_fresh_texture() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let old = gfx.textures.create_solid(0xFFFF0000);
    gfx.bind_texture(&old);
    let old_id = old.id();
    assert!(old_id.is_some());

    gfx.clear_textures();
    let fresh = gfx.textures.create_solid(0xFFFF0000);
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert!(Arc::ptr_eq(&fresh, &gfx.textures.create_solid(0xFFFF0000)));

    gfx.bind_texture(&fresh);
    assert!(fresh.id().is_some());
    assert_ne!(fresh.id(), old_id);
    assert_eq!(handle.live_textures(), 1);
}

#[test]
fn lost_context_regenerates_textures_from_pixels() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let texture = gfx.textures.create_solid(0xFFABCDEF);
    let image = Image::with_texture(texture.clone());
    image.draw(&mut gfx);
    let old_id = texture.id();

    handle.lose_context();
    handle.clear_calls();
    gfx.restore_context();

    assert!(texture.is_generated());
    assert_ne!(texture.id(), old_id);
    assert_eq!(handle.live_textures(), 1);
    assert_eq!(handle.count(|c| matches!(c, GpuCall::TexImage { width: 1, height: 1 })), 1);
    assert!(!gfx.has_script());
}

#[test]
fn pixmap_byte_sizes_do_not_wrap() {
    assert!(Pixmap::from_rgba(65_536, 65_536, Vec::new()).is_none());
    assert!(Pixmap::from_rgba(u32::MAX, u32::MAX, Vec::new()).is_none());
    assert!(Pixmap::from_rgba(2, 3, vec![0; 24]).is_some());

    let mut pixmap = Pixmap::new(3, 2);
    pixmap.set_pixel(2, 1, 0xFF112233);
    assert_eq!(pixmap.pixel(2, 1), 0xFF112233);
    assert_eq!(pixmap.data()[20..24], [0x11, 0x22, 0x33, 0xFF]);
}
