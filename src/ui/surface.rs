use {ratatui::style::Style, std::io};

/// Drawing target for the presenter
///
/// Text is staged with `write_text` and becomes visible on `show`.
pub trait Surface {
    /// Discard everything staged for the next frame
    fn clear(&mut self);

    fn write_text(&mut self, x: u16, y: u16, text: &str, style: Style);

    fn show(&mut self) -> io::Result<()>;

    /// `(columns, rows)`
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Repaint the whole physical screen on the next `show`
    fn sync(&mut self) -> io::Result<()>;

    /// Restore the terminal; safe to call more than once
    fn finalize(&mut self) -> io::Result<()>;
}
