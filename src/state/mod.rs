pub mod context;
mod editor_state;
pub mod persistence;

pub use context::{DEFAULT_ITEM_DURATION, EditorContext};
pub use editor_state::{Gesture, TimelineDrag, TimelineDragKind, TransformTarget};
pub use persistence::{MemoryProjectStore, ProjectStore, SaveDebounce, SaveOutcome, SaveQueue};

#[cfg(not(target_arch = "wasm32"))]
pub use persistence::JsonFileStore;
