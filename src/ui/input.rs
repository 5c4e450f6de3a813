//! Keyboard listener
//!
//! Runs on its own thread because `crossterm::event::poll` blocks. Quit keys
//! are handled here directly; everything the render loop needs to act on is
//! forwarded as a `KeyCommand` through a small bounded inbox.

use {
    crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    std::{io, thread::JoinHandle, time::Duration},
    tokio::sync::mpsc::{self, error::TrySendError},
    tokio_util::sync::CancellationToken,
};

/// Upper bound on how long a cancellation can go unnoticed by the listener
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Work for the render loop
///
/// Every command, `Clear` and `Sync` included, takes the tick's single key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ScrollUp,
    ScrollDown,
    /// Blank the staged frame
    Clear,
    /// Full repaint of the physical screen
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Forward(KeyCommand),
    Ignore,
}

pub fn classify(key: &KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl => KeyAction::Quit,
        KeyCode::Char('l') | KeyCode::Char('L') if ctrl => KeyAction::Forward(KeyCommand::Sync),
        KeyCode::Char('c') | KeyCode::Char('C') => KeyAction::Forward(KeyCommand::Clear),
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Forward(KeyCommand::ScrollUp),
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Forward(KeyCommand::ScrollDown),
        _ => KeyAction::Ignore,
    }
}

/// Listener loop over any event source
///
/// `next_event` waits at most the given duration and returns `None` on timeout.
pub fn run_key_listener<F>(
    mut next_event: F,
    commands: mpsc::Sender<KeyCommand>,
    cancel: CancellationToken,
) where
    F: FnMut(Duration) -> io::Result<Option<Event>>,
{
    log::info!("Key listener started");

    while !cancel.is_cancelled() {
        let key = match next_event(POLL_INTERVAL) {
            Ok(Some(Event::Key(key))) => key,
            Ok(_) => continue,
            Err(e) => {
                log::error!("Input polling failed: {}", e);
                cancel.cancel();
                break;
            }
        };

        log::debug!("Key event: {:?}", key);

        match classify(&key) {
            KeyAction::Quit => {
                log::info!("Exiting");
                cancel.cancel();
                break;
            }
            KeyAction::Forward(command) => match commands.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::debug!("Key inbox full, dropping {:?}", command);
                }
                Err(TrySendError::Closed(_)) => break,
            },
            KeyAction::Ignore => {}
        }
    }

    log::info!("Key listener stopped");
}

/// Terminal event source
pub fn crossterm_events(timeout: Duration) -> io::Result<Option<Event>> {
    if crossterm::event::poll(timeout)? {
        crossterm::event::read().map(Some)
    } else {
        Ok(None)
    }
}

pub fn spawn_key_listener(
    commands: mpsc::Sender<KeyCommand>,
    cancel: CancellationToken,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("key-listener".to_string())
        .spawn(move || run_key_listener(crossterm_events, commands, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn scripted(events: Vec<Event>) -> impl FnMut(Duration) -> io::Result<Option<Event>> {
        let mut events: VecDeque<Event> = events.into();
        move |_| Ok(events.pop_front())
    }

    #[test]
    fn test_classify() {
        let none = KeyModifiers::NONE;
        let ctrl = KeyModifiers::CONTROL;

        assert_eq!(classify(&press(KeyCode::Esc, none)), KeyAction::Quit);
        assert_eq!(classify(&press(KeyCode::Char('c'), ctrl)), KeyAction::Quit);
        assert_eq!(
            classify(&press(KeyCode::Char('l'), ctrl)),
            KeyAction::Forward(KeyCommand::Sync)
        );
        assert_eq!(
            classify(&press(KeyCode::Char('C'), KeyModifiers::SHIFT)),
            KeyAction::Forward(KeyCommand::Clear)
        );
        assert_eq!(
            classify(&press(KeyCode::Up, none)),
            KeyAction::Forward(KeyCommand::ScrollUp)
        );
        assert_eq!(
            classify(&press(KeyCode::Char('j'), none)),
            KeyAction::Forward(KeyCommand::ScrollDown)
        );
        assert_eq!(classify(&press(KeyCode::Char('x'), none)), KeyAction::Ignore);
    }

    #[test]
    fn test_release_events_ignored() {
        let mut key = press(KeyCode::Esc, KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;

        assert_eq!(classify(&key), KeyAction::Ignore);
    }

    #[test]
    fn test_listener_forwards_navigation_and_quits() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let events = vec![
            Event::Key(press(KeyCode::Down, KeyModifiers::NONE)),
            Event::FocusGained,
            Event::Key(press(KeyCode::Char('x'), KeyModifiers::NONE)),
            Event::Key(press(KeyCode::Up, KeyModifiers::NONE)),
            Event::Key(press(KeyCode::Esc, KeyModifiers::NONE)),
            Event::Key(press(KeyCode::Down, KeyModifiers::NONE)),
        ];

        run_key_listener(scripted(events), tx, cancel.clone());

        assert!(cancel.is_cancelled());
        assert_eq!(rx.try_recv().unwrap(), KeyCommand::ScrollDown);
        assert_eq!(rx.try_recv().unwrap(), KeyCommand::ScrollUp);
        // Nothing after the quit key is read
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_never_blocks_on_full_inbox() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut events: Vec<Event> = (0..10)
            .map(|_| Event::Key(press(KeyCode::Down, KeyModifiers::NONE)))
            .collect();
        events.push(Event::Key(press(KeyCode::Esc, KeyModifiers::NONE)));

        run_key_listener(scripted(events), tx, cancel.clone());

        assert!(cancel.is_cancelled());
        assert_eq!(rx.try_recv().unwrap(), KeyCommand::ScrollDown);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_stops_when_cancelled() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut polled = false;
        run_key_listener(
            |_| {
                polled = true;
                Ok(None)
            },
            tx,
            cancel,
        );
        assert!(!polled);
    }

    #[test]
    fn test_poll_error_cancels() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        run_key_listener(
            |_| Err(io::Error::new(io::ErrorKind::Other, "tty gone")),
            tx,
            cancel.clone(),
        );
        assert!(cancel.is_cancelled());
    }
}
