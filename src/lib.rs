#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod bitmap;
pub mod document;
pub mod error;
pub mod fill;
pub mod gizmo;
pub mod history;
pub mod id_generator;
pub mod input;
pub mod layer;
pub mod panels;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod state;
pub mod stroke;
pub mod texture_manager;
pub mod timeline;
pub mod tool;
pub mod upload;
pub mod util;

pub use app::StoryboardApp;
pub use document::{Document, Frame, FrameInsert};
pub use error::{SceneError, StoreError, StoreResult, UploadError};
pub use scene::ScenePayload;
pub use settings::EditorSettings;
pub use state::{EditorContext, MemoryProjectStore, ProjectStore};
pub use stroke::{StrokeSample, StrokeStyle};
pub use timeline::{ElementRef, PlaybackClock, TimelineView, Tracks};
pub use tool::{ToolKind, ToolSettings};
