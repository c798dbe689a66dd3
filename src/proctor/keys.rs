use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What the controller does with a key press while a session is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVerdict {
    /// Delivered to the host screen.
    Allow,
    /// Swallowed without any other effect.
    Suppress,
    /// Escape. Never reaches the host; may open the quit confirmation.
    Escape,
    /// The in-app quit chord (Ctrl+Q).
    QuitRequest,
}

const SUPPRESSED_FUNCTION_KEYS: [u8; 3] = [1, 5, 12];

fn has_chord_modifier(modifiers: KeyModifiers) -> bool {
    modifiers.intersects(
        KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER | KeyModifiers::META,
    )
}

/// Classify a key against the lockdown policy.
///
/// Reload (F5, Ctrl+R), help (F1), inspector chords (F12, Ctrl+Shift+I/J/C),
/// view-source (Ctrl+U), focus traversal (Tab) and every Alt/Ctrl/Meta chord
/// are suppressed. Plain characters, arrows, Enter and Backspace pass through.
pub fn classify(key: &KeyEvent) -> KeyVerdict {
    if key.kind == KeyEventKind::Release {
        return KeyVerdict::Suppress;
    }

    match key.code {
        KeyCode::Esc => KeyVerdict::Escape,
        KeyCode::F(n) if SUPPRESSED_FUNCTION_KEYS.contains(&n) => KeyVerdict::Suppress,
        KeyCode::Tab | KeyCode::BackTab => KeyVerdict::Suppress,
        KeyCode::Char(c)
            if key.modifiers == KeyModifiers::CONTROL && c.eq_ignore_ascii_case(&'q') =>
        {
            KeyVerdict::QuitRequest
        }
        _ if has_chord_modifier(key.modifiers) => KeyVerdict::Suppress,
        _ => KeyVerdict::Allow,
    }
}

/// Chords that would close or kill the host (Ctrl+C, Ctrl+W). They are
/// reported as an unload attempt rather than a plain suppressed key.
pub fn is_unload_chord(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('w'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn plain_input_is_allowed() {
        for code in [
            KeyCode::Char('a'),
            KeyCode::Char('3'),
            KeyCode::Enter,
            KeyCode::Backspace,
            KeyCode::Up,
            KeyCode::Down,
        ] {
            assert_eq!(classify(&key(code, KeyModifiers::NONE)), KeyVerdict::Allow);
        }
        // shifted characters are ordinary input
        assert_eq!(
            classify(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            KeyVerdict::Allow
        );
    }

    #[test]
    fn disruptive_keys_are_suppressed() {
        let cases = [
            key(KeyCode::F(1), KeyModifiers::NONE),
            key(KeyCode::F(5), KeyModifiers::NONE),
            key(KeyCode::F(12), KeyModifiers::NONE),
            key(KeyCode::Tab, KeyModifiers::NONE),
            key(KeyCode::BackTab, KeyModifiers::SHIFT),
            key(KeyCode::Char('r'), KeyModifiers::CONTROL),
            key(KeyCode::Char('u'), KeyModifiers::CONTROL),
            key(KeyCode::Char('I'), KeyModifiers::CONTROL | KeyModifiers::SHIFT),
            key(KeyCode::Char('J'), KeyModifiers::CONTROL | KeyModifiers::SHIFT),
            key(KeyCode::Char('C'), KeyModifiers::CONTROL | KeyModifiers::SHIFT),
            key(KeyCode::Left, KeyModifiers::ALT),
            key(KeyCode::Char('x'), KeyModifiers::SUPER),
        ];
        for k in cases {
            assert_eq!(classify(&k), KeyVerdict::Suppress, "{:?}", k);
        }
    }

    #[test]
    fn other_function_keys_pass() {
        assert_eq!(
            classify(&key(KeyCode::F(2), KeyModifiers::NONE)),
            KeyVerdict::Allow
        );
    }

    #[test]
    fn escape_and_quit_chord() {
        assert_eq!(
            classify(&key(KeyCode::Esc, KeyModifiers::NONE)),
            KeyVerdict::Escape
        );
        assert_eq!(
            classify(&key(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            KeyVerdict::QuitRequest
        );
        // Ctrl+Alt+Q is just another chord
        assert_eq!(
            classify(&key(
                KeyCode::Char('q'),
                KeyModifiers::CONTROL | KeyModifiers::ALT
            )),
            KeyVerdict::Suppress
        );
    }

    #[test]
    fn releases_never_reach_the_host() {
        let mut k = key(KeyCode::Char('a'), KeyModifiers::NONE);
        k.kind = KeyEventKind::Release;
        assert_eq!(classify(&k), KeyVerdict::Suppress);
    }

    #[test]
    fn unload_chords() {
        assert!(is_unload_chord(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(is_unload_chord(&key(KeyCode::Char('w'), KeyModifiers::CONTROL)));
        assert!(!is_unload_chord(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
