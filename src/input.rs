use egui::{Context, Event, Key, Modifiers};

/// Keyboard commands the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    DuplicateElement,
    DeleteElement,
    TogglePlay,
    PreviousFrame,
    NextFrame,
    DeleteKeyframe,
    CommitFloating,
}

impl Shortcut {
    pub fn from_key(key: Key, modifiers: Modifiers) -> Option<Self> {
        if modifiers.command {
            return match key {
                Key::Z if !modifiers.shift => Some(Shortcut::Undo),
                Key::D => Some(Shortcut::DuplicateElement),
                Key::E => Some(Shortcut::DeleteElement),
                _ => None,
            };
        }
        match key {
            Key::Space => Some(Shortcut::TogglePlay),
            Key::ArrowLeft => Some(Shortcut::PreviousFrame),
            Key::ArrowRight => Some(Shortcut::NextFrame),
            Key::Delete | Key::Backspace => Some(Shortcut::DeleteKeyframe),
            Key::Enter => Some(Shortcut::CommitFloating),
            _ => None,
        }
    }
}

/// Shortcuts pressed this frame. Nothing is reported while a text field has focus.
pub fn collect_shortcuts(ctx: &Context) -> Vec<Shortcut> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|i| {
        i.events
            .iter()
            .filter_map(|event| match event {
                Event::Key { key, pressed: true, repeat, modifiers, .. } => {
                    let shortcut = Shortcut::from_key(*key, *modifiers)?;
                    // Holding an arrow key keeps stepping; everything else fires once.
                    let repeats = matches!(shortcut, Shortcut::PreviousFrame | Shortcut::NextFrame);
                    (!*repeat || repeats).then_some(shortcut)
                }
                _ => None,
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_shortcuts() {
        assert_eq!(Shortcut::from_key(Key::Z, Modifiers::COMMAND), Some(Shortcut::Undo));
        assert_eq!(Shortcut::from_key(Key::D, Modifiers::COMMAND), Some(Shortcut::DuplicateElement));
        assert_eq!(Shortcut::from_key(Key::E, Modifiers::COMMAND), Some(Shortcut::DeleteElement));
        assert_eq!(Shortcut::from_key(Key::Z, Modifiers::NONE), None);
    }

    #[test]
    fn test_plain_shortcuts() {
        assert_eq!(Shortcut::from_key(Key::Space, Modifiers::NONE), Some(Shortcut::TogglePlay));
        assert_eq!(Shortcut::from_key(Key::Backspace, Modifiers::NONE), Some(Shortcut::DeleteKeyframe));
        assert_eq!(Shortcut::from_key(Key::ArrowRight, Modifiers::NONE), Some(Shortcut::NextFrame));
    }
}
