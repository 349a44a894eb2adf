//! The gesture state machine.
//!
//! Exactly one drag gesture can be active at a time. Every gesture starts from
//! `Idle` and ends back in `Idle`, either on release, when the pointer leaves
//! the canvas, or when the tool changes underneath it (in which case the
//! gesture is finished as if released).
//!
//! ```text
//!            ┌──────────────┐
//!      ┌─────►   Stroking   ├─────┐
//!      │     └──────────────┘     │
//!      │     ┌──────────────┐     │
//! ┌────┴─┐   │  Selecting   │   ┌─▼────┐
//! │ Idle ├───►              ├───► Idle │
//! └────┬─┘   └──────────────┘   └─▲────┘
//!      │     ┌──────────────┐     │
//!      ├─────► Transforming ├─────┤
//!      │     └──────────────┘     │
//!      │     ┌──────────────┐     │
//!      └─────► TimelineDrag ├─────┘
//!            └──────────────┘
//! ```

use egui::Pos2;

use crate::gizmo::TransformDrag;
use crate::layer::LayerId;
use crate::selection::SelectionMode;
use crate::stroke::StrokeRenderer;
use crate::timeline::ElementRef;

/// What is being transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformTarget {
    Floating,
    Reference(String),
    /// Moving a sprite writes a keyframe at the playhead
    Animatic(String),
}

/// Which part of a timeline item (or the ruler) is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineDragKind {
    Move,
    TrimStart,
    TrimEnd,
    /// Drag on the ruler: horizontal motion zooms
    Zoom,
    /// Drag of the playhead
    Scrub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineDrag {
    pub kind: TimelineDragKind,
    pub element: Option<ElementRef>,
    pub origin_x: f32,
    pub origin_start: f64,
    pub origin_duration: f64,
    /// Last applied x, for incremental zoom
    pub last_x: f32,
}

#[derive(Debug, Clone, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// A brush or eraser stroke into one layer of one frame
    Stroking {
        renderer: StrokeRenderer,
        frame: usize,
        layer: LayerId,
    },
    Selecting {
        mode: SelectionMode,
        start: Pos2,
        current: Pos2,
        points: Vec<Pos2>,
    },
    Transforming {
        drag: TransformDrag,
        target: TransformTarget,
    },
    TimelineDrag(TimelineDrag),
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Idle => "Idle",
            Gesture::Stroking { .. } => "Stroking",
            Gesture::Selecting { .. } => "Selecting",
            Gesture::Transforming { .. } => "Transforming",
            Gesture::TimelineDrag(_) => "TimelineDrag",
        }
    }

    /// Gestures only start from `Idle`, and always end in `Idle`.
    pub fn can_transition_to(&self, next: &Gesture) -> bool {
        matches!((self, next), (Gesture::Idle, _) | (_, Gesture::Idle))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self, Gesture::Stroking { .. })
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self, Gesture::Selecting { .. })
    }

    pub fn is_transforming(&self) -> bool {
        matches!(self, Gesture::Transforming { .. })
    }

    pub fn is_timeline_drag(&self) -> bool {
        matches!(self, Gesture::TimelineDrag(_))
    }
}
