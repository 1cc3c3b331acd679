use std::collections::HashMap;

use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use helm_core::command_line::InputKey;

use crate::app::Screen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KeyChord {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyChord {
    fn new(mut code: KeyCode, modifiers: KeyModifiers) -> Self {
        if let KeyCode::Char(c) = code {
            code = KeyCode::Char(c.to_ascii_lowercase());
        }
        Self { code, modifiers }
    }

    fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

impl From<&KeyEvent> for KeyChord {
    fn from(key: &KeyEvent) -> Self {
        Self::new(key.code, key.modifiers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Quit,
    SwitchScreen,
    ToggleServer,
    Reconnect,
    SelectPrev,
    SelectNext,
    SelectFirst,
    SelectLast,
    /// Toggle the selected directory, retry a failed load, or show file
    /// details.
    Activate,
    Expand,
    Collapse,
    Rename,
    Delete,
    NewFolder,
    Refresh,
    ToggleDetails,
}

#[derive(Debug, Default)]
pub(crate) struct Keymap {
    global: HashMap<KeyChord, Action>,
    drive: HashMap<KeyChord, Action>,
}

impl Keymap {
    pub(crate) fn new() -> Self {
        let mut keymap = Self::default();
        keymap.populate_global();
        keymap.populate_drive();
        keymap
    }

    fn populate_global(&mut self) {
        use Action::*;
        self.global.insert(KeyChord::ctrl('c'), Quit);
        self.global.insert(KeyChord::ctrl('q'), Quit);
        self.global.insert(KeyChord::plain(KeyCode::F(2)), SwitchScreen);
        self.global.insert(KeyChord::ctrl('d'), SwitchScreen);
        self.global.insert(KeyChord::ctrl('s'), ToggleServer);
        self.global.insert(KeyChord::ctrl('r'), Reconnect);
    }

    fn populate_drive(&mut self) {
        use Action::*;
        for (code, action) in [
            (KeyCode::Up, SelectPrev),
            (KeyCode::Char('k'), SelectPrev),
            (KeyCode::Down, SelectNext),
            (KeyCode::Char('j'), SelectNext),
            (KeyCode::Home, SelectFirst),
            (KeyCode::End, SelectLast),
            (KeyCode::Enter, Activate),
            (KeyCode::Char(' '), Activate),
            (KeyCode::Right, Expand),
            (KeyCode::Char('l'), Expand),
            (KeyCode::Left, Collapse),
            (KeyCode::Char('h'), Collapse),
            (KeyCode::Char('r'), Rename),
            (KeyCode::Char('d'), Delete),
            (KeyCode::Delete, Delete),
            (KeyCode::Char('n'), NewFolder),
            (KeyCode::F(5), Refresh),
            (KeyCode::Char('i'), ToggleDetails),
            (KeyCode::Esc, SwitchScreen),
        ] {
            self.drive.insert(KeyChord::plain(code), action);
        }
        self.drive
            .insert(KeyChord::new(KeyCode::Char('g'), KeyModifiers::SHIFT), SelectLast);
        self.drive.insert(KeyChord::plain(KeyCode::Char('g')), SelectFirst);
    }

    /// Action bound to `key` on `screen`. Global chords win over screen ones.
    pub(crate) fn action(&self, screen: Screen, key: &KeyEvent) -> Option<Action> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let chord = KeyChord::from(key);
        self.global
            .get(&chord)
            .or_else(|| match screen {
                Screen::Drive => self.drive.get(&chord),
                Screen::Console => None,
            })
            .copied()
    }
}

/// Translate a terminal key into the command line's vocabulary. Chords with
/// Ctrl or Alt are not text input.
pub(crate) fn input_key(key: &KeyEvent) -> Option<InputKey> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return None;
    }
    let input = match key.code {
        KeyCode::Char(c) => InputKey::Char(c),
        KeyCode::Backspace => InputKey::Backspace,
        KeyCode::Delete => InputKey::Delete,
        KeyCode::Left => InputKey::Left,
        KeyCode::Right => InputKey::Right,
        KeyCode::Home => InputKey::Home,
        KeyCode::End => InputKey::End,
        KeyCode::Up => InputKey::Up,
        KeyCode::Down => InputKey::Down,
        KeyCode::Enter => InputKey::Enter,
        KeyCode::Tab => InputKey::Tab,
        KeyCode::Esc => InputKey::Escape,
        _ => return None,
    };
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn global_chords_apply_on_every_screen() {
        let keymap = Keymap::new();
        let ctrl_c = key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(keymap.action(Screen::Console, &ctrl_c), Some(Action::Quit));
        assert_eq!(keymap.action(Screen::Drive, &ctrl_c), Some(Action::Quit));
        let f2 = key(KeyCode::F(2), KeyModifiers::NONE);
        assert_eq!(
            keymap.action(Screen::Console, &f2),
            Some(Action::SwitchScreen)
        );
    }

    #[test]
    fn drive_keys_stay_out_of_the_console() {
        let keymap = Keymap::new();
        let j = key(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(keymap.action(Screen::Drive, &j), Some(Action::SelectNext));
        assert_eq!(keymap.action(Screen::Console, &j), None);
        let shift_g = key(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(
            keymap.action(Screen::Drive, &shift_g),
            Some(Action::SelectLast)
        );
    }

    #[test]
    fn releases_are_ignored() {
        let keymap = Keymap::new();
        let mut release = key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        release.kind = KeyEventKind::Release;
        assert_eq!(keymap.action(Screen::Console, &release), None);
        assert_eq!(input_key(&release), None);
    }

    #[test]
    fn text_keys_map_to_input() {
        assert_eq!(
            input_key(&key(KeyCode::Char('L'), KeyModifiers::SHIFT)),
            Some(InputKey::Char('L'))
        );
        assert_eq!(
            input_key(&key(KeyCode::Tab, KeyModifiers::NONE)),
            Some(InputKey::Tab)
        );
        assert_eq!(
            input_key(&key(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            None
        );
        assert_eq!(input_key(&key(KeyCode::F(5), KeyModifiers::NONE)), None);
    }
}
