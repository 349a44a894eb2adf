use std::sync::Arc;

use egui::TextureHandle;

use crate::input::collect_shortcuts;
use crate::panels::{central_panel, timeline_panel, tools_panel};
use crate::settings::EditorSettings;
use crate::state::{EditorContext, ProjectStore};
use crate::texture_manager::TextureManager;
use crate::util::time::now_ms;

/// Composites, sprites and the floating selection; a few frames either side of
/// the playhead fit comfortably.
const TEXTURE_CACHE_SIZE: usize = 32;

pub struct StoryboardApp {
    pub(crate) editor: EditorContext,
    pub(crate) settings: EditorSettings,
    pub(crate) textures: TextureManager,
    /// Live preview of the stroke being drawn, re-uploaded every frame while stroking
    pub(crate) stroke_overlay: Option<TextureHandle>,
    /// Scene key being typed into the scene picker
    pub(crate) scene_input: String,
    /// Path typed into the import field
    pub(crate) import_path: String,
}

impl std::fmt::Debug for StoryboardApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryboardApp")
            .field("editor", &self.editor)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl StoryboardApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings: EditorSettings = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();
        Self::with_settings(settings.with_env_overrides(), default_store)
    }

    /// Builds the app around a store chosen from the settings.
    pub fn with_settings(
        settings: EditorSettings,
        make_store: impl FnOnce(&EditorSettings) -> Arc<dyn ProjectStore>,
    ) -> Self {
        let store = make_store(&settings);
        let mut editor = EditorContext::new(store, &settings);
        editor.open_scene(&settings.scene_key);
        log::info!("Storyboard editor started on scene {:?}", settings.scene_key);

        Self {
            scene_input: settings.scene_key.clone(),
            editor,
            settings,
            textures: TextureManager::new(TEXTURE_CACHE_SIZE),
            stroke_overlay: None,
            import_path: String::new(),
        }
    }

    pub fn editor(&self) -> &EditorContext {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorContext {
        &mut self.editor
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Copies editor-side preferences back into the persisted settings.
    fn sync_settings(&mut self) {
        self.settings.tools = self.editor.tool_settings.clone();
        self.settings.timeline_zoom = self.editor.view.pixels_per_second();
        self.settings.scene_key = self.editor.scene_key().to_string();
    }

    fn show_notices(&mut self, ctx: &egui::Context) {
        let mut dismissed = None;
        for (i, notice) in self.editor.notices().iter().enumerate() {
            egui::Window::new(&notice.title)
                .id(egui::Id::new(("notice", i)))
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 12.0 + i as f32 * 90.0))
                .show(ctx, |ui| {
                    ui.label(&notice.message);
                    if ui.button("Dismiss").clicked() {
                        dismissed = Some(i);
                    }
                });
        }
        if let Some(i) = dismissed {
            self.editor.dismiss_notice(i);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_store(settings: &EditorSettings) -> Arc<dyn ProjectStore> {
    log::info!("Scenes are stored in {}", settings.store_dir.display());
    Arc::new(crate::state::JsonFileStore::new(settings.store_dir.clone()))
}

#[cfg(target_arch = "wasm32")]
fn default_store(_settings: &EditorSettings) -> Arc<dyn ProjectStore> {
    Arc::new(crate::state::MemoryProjectStore::new())
}

impl eframe::App for StoryboardApp {
    /// Called by the framework to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.sync_settings();
        eframe::set_value(storage, eframe::APP_KEY, &self.settings);
        self.editor.flush();
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = now_ms();
        for shortcut in collect_shortcuts(ctx) {
            log::debug!("Shortcut: {shortcut:?}");
            self.editor.handle_shortcut(shortcut, now);
        }
        self.editor.tick(now);
        self.textures.begin_frame();

        tools_panel(self, ctx);
        timeline_panel(self, ctx, now);
        central_panel(self, ctx);
        self.show_notices(ctx);

        let busy = self.editor.clock().is_playing()
            || self.editor.is_saving()
            || self.editor.is_loading()
            || self.editor.pending_uploads() > 0;
        if busy {
            ctx.request_repaint();
        } else {
            // Keeps the save debounce ticking after the last edit.
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.editor.flush();
        for _ in 0..8 {
            if !self.editor.is_saving() {
                break;
            }
            self.editor.tick(now_ms());
        }
    }
}
