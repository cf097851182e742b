use reel_core::hash::hash_frame;
use reel_core::{Color, FrameBuffer};
use reel_ir::{Edges, ImageFit, LayerBuilder, Scene, SceneBuilder};
use reel_render::{FontBook, PlaybackController, RenderDiagnostic, SceneRenderer};

fn renderer() -> SceneRenderer {
    SceneRenderer::with_fonts(FontBook::empty())
}

/// Three animated layers over a 6 second scene at 64x36.
fn animated_scene() -> Scene {
    let mut bg = LayerBuilder::text("panel", "");
    bg.size(100.0, 100.0)
        .visible(0.0, 6.0)
        .boxed(Color::rgb(20, 20, 40), Edges::default(), 0.0);

    let mut card = LayerBuilder::text("card", "");
    card.position(25.0, 25.0)
        .size(50.0, 50.0)
        .z_index(1)
        .visible(2.0, 5.0)
        .animation("rotateIn")
        .boxed(Color::RED, Edges::default(), 4.0);

    let mut flip = LayerBuilder::text("flip", "");
    flip.position(10.0, 10.0)
        .size(30.0, 30.0)
        .z_index(2)
        .visible(1.0, 6.0)
        .animation("flipInX")
        .boxed(Color::WHITE, Edges::default(), 0.0);

    let mut blur = LayerBuilder::text("blur", "");
    blur.position(60.0, 60.0)
        .size(20.0, 20.0)
        .z_index(3)
        .visible(0.0, 6.0)
        .animation("blurIn")
        .boxed(Color::BLUE, Edges::default(), 0.0);

    let mut builder = SceneBuilder::new("determinism", 6.0);
    builder
        .resolution(64, 36)
        .background(Color::BLACK)
        .add_layer(bg.build())
        .add_layer(card.build())
        .add_layer(flip.build())
        .add_layer(blur.build());
    builder.build().unwrap()
}

#[test]
fn test_same_time_same_hash_across_renderers() {
    let scene = animated_scene();
    for t in [0.0, 0.1, 1.25, 2.2, 3.0, 5.0, 6.0] {
        let a = renderer().render(&scene, t, 64, 36, 1.0);
        let b = renderer().render(&scene, t, 64, 36, 1.0);
        assert_eq!(hash_frame(&a.frame), hash_frame(&b.frame), "t = {}", t);
    }
}

#[test]
fn test_render_order_does_not_matter() {
    let scene = animated_scene();
    let mut forward = renderer();
    let mut backward = renderer();
    let times = [0.3, 1.1, 2.4, 4.9];
    let a: Vec<_> = times
        .iter()
        .map(|t| hash_frame(&forward.render(&scene, *t, 64, 36, 1.0).frame))
        .collect();
    let mut b: Vec<_> = times
        .iter()
        .rev()
        .map(|t| hash_frame(&backward.render(&scene, *t, 64, 36, 1.0).frame))
        .collect();
    b.reverse();
    assert_eq!(a, b);
}

#[test]
fn test_preview_and_direct_render_agree() {
    let scene = animated_scene();
    let direct = renderer().render(&scene, 2.25, 64, 36, 1.0);
    let mut controller = PlaybackController::new(scene, renderer());
    controller.seek(2.25);
    let preview = controller.render_current(64, 36);
    assert_eq!(hash_frame(&direct.frame), hash_frame(&preview.frame));
}

#[test]
fn test_visibility_is_inclusive() {
    let mut layer = LayerBuilder::text("t", "");
    layer
        .size(100.0, 100.0)
        .visible(2.0, 5.0)
        .boxed(Color::RED, Edges::default(), 0.0);
    let mut builder = SceneBuilder::new("s", 6.0);
    builder
        .resolution(8, 8)
        .background(Color::BLACK)
        .add_layer(layer.build());
    let scene = builder.build().unwrap();

    let mut r = renderer();
    let px = |r: &mut SceneRenderer, t: f64| r.render(&scene, t, 8, 8, 1.0).frame.get_pixel(4, 4);
    assert_eq!(px(&mut r, 1.999), Some([0, 0, 0, 255]));
    assert_eq!(px(&mut r, 2.0), Some([255, 0, 0, 255]));
    assert_eq!(px(&mut r, 5.0), Some([255, 0, 0, 255]));
    assert_eq!(px(&mut r, 5.001), Some([0, 0, 0, 255]));
}

#[test]
fn test_export_scale_multiplies_pixel_values() {
    // 10px padding at native 40x40 becomes 20px at 80x80.
    let mut layer = LayerBuilder::text("t", "");
    layer
        .position(0.0, 0.0)
        .visible(0.0, 1.0)
        .font("Inter", 10.0)
        .boxed(Color::RED, Edges::uniform(10.0), 0.0);
    let mut builder = SceneBuilder::new("s", 1.0);
    builder
        .resolution(40, 40)
        .background(Color::BLACK)
        .add_layer(layer.build());
    let scene = builder.build().unwrap();

    let mut r = renderer();
    let native = r.render(&scene, 0.5, 40, 40, 1.0);
    let doubled = r.render(&scene, 0.5, 80, 80, 2.0);
    // Native box: 0 + 20 wide, 12 + 20 tall.
    assert_eq!(native.frame.get_pixel(19, 31), Some([255, 0, 0, 255]));
    assert_eq!(native.frame.get_pixel(20, 20), Some([0, 0, 0, 255]));
    assert_eq!(doubled.frame.get_pixel(39, 63), Some([255, 0, 0, 255]));
    assert_eq!(doubled.frame.get_pixel(40, 40), Some([0, 0, 0, 255]));
}

#[test]
fn test_image_layer_renders_and_failures_are_local() {
    let dir = std::env::temp_dir().join(format!("reel-render-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let png = dir.join("green.png");
    let src = FrameBuffer::solid(4, 4, &Color::GREEN);
    image::save_buffer(&png, &src.data, 4, 4, image::ColorType::Rgba8).unwrap();

    let mut good = LayerBuilder::image("good", "green.png");
    good.size(50.0, 100.0).visible(0.0, 1.0).fit(ImageFit::Fill);
    let mut bad = LayerBuilder::image("bad", "missing.png");
    bad.position(50.0, 0.0).size(50.0, 100.0).visible(0.0, 1.0);

    let mut builder = SceneBuilder::new("s", 1.0);
    builder
        .resolution(8, 4)
        .background(Color::BLACK)
        .add_layer(good.build())
        .add_layer(bad.build());
    let scene = builder.build().unwrap();

    let mut r = renderer().with_asset_root(&dir);
    let out = r.render(&scene, 0.5, 8, 4, 1.0);
    assert_eq!(out.frame.get_pixel(1, 1), Some([0, 128, 0, 255]));
    assert_eq!(out.frame.get_pixel(6, 1), Some([0, 0, 0, 255]));
    assert_eq!(out.diagnostics.len(), 1);
    assert!(matches!(
        &out.diagnostics[0],
        RenderDiagnostic::ResourceLoad { layer, .. } if layer == "bad"
    ));

    let _ = std::fs::remove_dir_all(&dir);
}
