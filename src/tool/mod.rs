use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::selection::{DEFAULT_TOLERANCE, SelectionMode};
use crate::stroke::{BrushPreset, StrokeStyle};

/// The active canvas tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
    Bucket,
    RectSelect,
    Lasso,
    MagicWand,
    Transform,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Brush,
        ToolKind::Eraser,
        ToolKind::Bucket,
        ToolKind::RectSelect,
        ToolKind::Lasso,
        ToolKind::MagicWand,
        ToolKind::Transform,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Brush => "Brush",
            ToolKind::Eraser => "Eraser",
            ToolKind::Bucket => "Bucket",
            ToolKind::RectSelect => "Rect Select",
            ToolKind::Lasso => "Lasso",
            ToolKind::MagicWand => "Magic Wand",
            ToolKind::Transform => "Transform",
        }
    }

    pub fn selection_mode(&self) -> Option<SelectionMode> {
        match self {
            ToolKind::RectSelect => Some(SelectionMode::Rectangle),
            ToolKind::Lasso => Some(SelectionMode::Freehand),
            ToolKind::MagicWand => Some(SelectionMode::Magic),
            _ => None,
        }
    }
}

/// User-adjustable parameters shared by the painting tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub preset: BrushPreset,
    pub color: Color32,
    /// Overrides the preset size when set
    pub size: Option<f32>,
    pub eraser_size: f32,
    /// Multiplied with the preset alpha when a stroke is composited
    pub opacity: f32,
    pub tolerance: u8,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            preset: BrushPreset::default(),
            color: Color32::BLACK,
            size: None,
            eraser_size: 16.0,
            opacity: 1.0,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ToolSettings {
    pub fn brush_style(&self) -> StrokeStyle {
        StrokeStyle::from_preset(self.preset, self.color, self.size)
    }

    pub fn eraser_style(&self) -> StrokeStyle {
        StrokeStyle::eraser(self.eraser_size)
    }

    /// Size shown on the slider: the override or the preset's own.
    pub fn effective_size(&self) -> f32 {
        self.size.unwrap_or(self.preset.params().size)
    }

    pub fn select_preset(&mut self, preset: BrushPreset) {
        self.preset = preset;
        self.size = None;
    }
}
