//! Prism Scene Engine
//!
//! Owner coordination and input routing for a Prism UI: one scene hosts a
//! main composition root plus a stack of overlay layers (popups, dialogs),
//! and decides per event which owner it belongs to.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ MultiLayerScene / SingleLayerScene           │
//! │  ┌─────────────┐  ┌────────────────────────┐ │
//! │  │ InputHandler│→ │ routing                │ │
//! │  └─────────────┘  │  gesture/hover/focus   │ │
//! │                   └───────────┬────────────┘ │
//! │        main Owner ── layer Owner ── layer …  │
//! │        (tree + focus)  (bounds, scrim)       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let scene = MultiLayerScene::new(platform, invalidate)?;
//! scene.set_content(Box::new(|tree| {
//!     tree.insert(None, app_root());
//! }));
//!
//! let dialog = scene.create_layer(true, dialog_bounds)?;
//! dialog.set_scrim(Some(Color::scrim(0.5)));
//! dialog.set_content(Box::new(|tree| {
//!     tree.insert(None, dialog_root());
//! }));
//!
//! // Host loop
//! scene.send_pointer(PointerEventKind::Move, cursor, now_millis);
//! scene.render(&mut canvas, frame_nanos);
//! ```

pub mod content;
pub mod error;
pub mod focus;
pub mod input;
pub mod layer;
pub mod node;
pub mod owner;
pub mod scene;

pub use content::{Composition, Content};
pub use error::{Result, SceneError};
pub use focus::FocusManager;
pub use input::{InputHandler, KeyEventCallback, PointerEventCallback};
pub use layer::{KeyInterceptor, OutsidePointerCallback, SceneLayer};
pub use node::{KeyHandler, LayoutNode, MovedCallback, NodeKey, NodeTree, PointerHandler};
pub use owner::{Constraints, Owner, OwnerId, PreparedPointerDispatch, SemanticsHandle};
pub use scene::{MultiLayerScene, SingleLayerScene};
