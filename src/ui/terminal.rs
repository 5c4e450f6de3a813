use {
    super::surface::Surface,
    ratatui::{backend::CrosstermBackend, style::Style, Terminal},
    std::io::{self, Stdout},
};

struct StagedText {
    x: u16,
    y: u16,
    text: String,
    style: Style,
}

/// Crossterm-backed terminal surface
///
/// Enters raw mode and the alternate screen on `init`; `finalize` (or drop)
/// puts the terminal back.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    staged: Vec<StagedText>,
    finalized: bool,
}

impl TerminalSurface {
    pub fn init() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;

        // The alternate screen keeps the dashboard off the shell's scrollback
        if let Err(e) = crossterm::execute!(
            io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide
        ) {
            let _ = crossterm::terminal::disable_raw_mode();
            return Err(e);
        }

        let mut surface = Self {
            terminal: Terminal::new(CrosstermBackend::new(io::stdout()))?,
            staged: Vec::new(),
            finalized: false,
        };
        surface.terminal.clear()?;
        Ok(surface)
    }
}

impl Surface for TerminalSurface {
    fn clear(&mut self) {
        self.staged.clear();
    }

    fn write_text(&mut self, x: u16, y: u16, text: &str, style: Style) {
        self.staged.push(StagedText {
            x,
            y,
            text: text.to_string(),
            style,
        });
    }

    fn show(&mut self) -> io::Result<()> {
        let staged = &self.staged;
        self.terminal.draw(|f| {
            let area = f.area();
            let buf = f.buffer_mut();
            for item in staged {
                if item.x < area.width && item.y < area.height {
                    let max_width = (area.width - item.x) as usize;
                    buf.set_stringn(item.x, item.y, &item.text, max_width, item.style);
                }
            }
        })?;
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let size = self.terminal.size()?;
        Ok((size.width, size.height))
    }

    fn sync(&mut self) -> io::Result<()> {
        self.terminal.clear()
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        crossterm::execute!(
            io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;
        crossterm::terminal::disable_raw_mode()
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            log::error!("Failed to restore terminal: {}", e);
        }
    }
}
