//! Headless Overlay Walkthrough
//!
//! Drives a scene without any window: builds main content, opens a modal
//! dialog layer with a scrim, and dismisses it by clicking outside. An
//! Escape interceptor is installed as a second dismissal path.
//!
//! Run with: cargo run -p prism_scene --example headless_overlay

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use prism_core::{Canvas, Color, Key, KeyEvent, PointerEventKind, Point, Rect};
use prism_platform::HeadlessPlatform;
use prism_scene::{LayoutNode, MultiLayerScene, SceneLayer};

/// Canvas that prints every fill instead of rasterizing
struct PrintCanvas;

impl Canvas for PrintCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        println!(
            "  fill {:>4}x{:<4} at ({}, {}) alpha {:.2}",
            rect.width(),
            rect.height(),
            rect.x(),
            rect.y(),
            color.a
        );
    }
    fn save(&mut self) {}
    fn restore(&mut self) {}
    fn clip_rect(&mut self, _rect: Rect) {}
    fn translate(&mut self, _dx: f32, _dy: f32) {}
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let scene = MultiLayerScene::new(Rc::new(HeadlessPlatform::default()), Arc::new(|| {}))
        .expect("headless platform reports usable bounds");

    scene.set_content(Box::new(|tree| {
        let mut background = LayoutNode::with_rect(Rect::new(0.0, 0.0, 800.0, 600.0));
        background.background = Some(Color::rgba(0.1, 0.1, 0.14, 1.0));
        background.pointer_handler = Some(Rc::new(|event| {
            println!("main content saw {:?}", event.kind);
        }));
        tree.insert(None, background);
    }));

    // A modal dialog: focusable, dimmed backdrop, dismissed from outside
    let dialog: Rc<RefCell<Option<SceneLayer>>> = Rc::new(RefCell::new(None));
    let layer = scene
        .create_layer(true, Rect::new(250.0, 200.0, 300.0, 200.0))
        .expect("multi-layer scenes always accept layers");
    layer.set_scrim(Some(Color::scrim(0.5)));
    layer.set_content(Box::new(|tree| {
        let mut panel = LayoutNode::with_rect(Rect::new(0.0, 0.0, 300.0, 200.0));
        panel.background = Some(Color::WHITE);
        panel.pointer_handler = Some(Rc::new(|event| {
            println!("dialog saw {:?}", event.kind);
        }));
        tree.insert(None, panel);
    }));

    let dismiss = Rc::clone(&dialog);
    layer.set_outside_pointer_callback(Some(Rc::new(move |kind, should_dismiss| {
        println!("outside the dialog: {kind:?} (dismiss: {should_dismiss})");
        if should_dismiss {
            if let Some(layer) = dismiss.borrow_mut().take() {
                layer.close();
            }
        }
    })));
    let escape = Rc::clone(&dialog);
    layer.set_key_interceptor(Some(Rc::new(move |event: &KeyEvent| {
        if event.key == Key::Escape {
            if let Some(layer) = escape.borrow_mut().take() {
                layer.close();
            }
            return true;
        }
        false
    })));
    *dialog.borrow_mut() = Some(layer);

    println!("frame 1: dialog open");
    scene.render(&mut PrintCanvas, 16_000_000);

    println!("click inside the dialog");
    scene.send_pointer(PointerEventKind::Press, Point::new(400.0, 300.0), 20);
    scene.send_pointer(PointerEventKind::Release, Point::new(400.0, 300.0), 40);

    println!("click outside the dialog (release dismisses it)");
    scene.send_pointer(PointerEventKind::Press, Point::new(50.0, 50.0), 60);
    scene.send_pointer(PointerEventKind::Release, Point::new(50.0, 50.0), 80);
    assert!(dialog.borrow().is_none());

    println!("frame 2: dialog gone, main content interactive again");
    scene.render(&mut PrintCanvas, 32_000_000);
    scene.send_pointer(PointerEventKind::Press, Point::new(50.0, 50.0), 100);
    scene.send_pointer(PointerEventKind::Release, Point::new(50.0, 50.0), 120);

    scene.close();
}
