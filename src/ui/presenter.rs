//! Render loop
//!
//! One tick, in order: clear, title, take at most one snapshot, take at most
//! one key command, render the visible window of equipment lines, show.
//! Both inbox reads are `try_recv`, so a tick never waits on data or input.

use {
    super::{
        input::KeyCommand,
        layout::{self, HEADER_ROWS},
        surface::Surface,
    },
    crate::state::Snapshot,
    chrono::Local,
    std::{
        io,
        time::{Duration, Instant},
    },
    tokio::{
        sync::mpsc,
        time::{interval, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
};

/// First rendered line, kept within `[0, len - 1]` of the current list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollPosition(usize);

impl ScrollPosition {
    pub fn get(&self) -> usize {
        self.0
    }

    pub fn up(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn down(&mut self, len: usize) {
        if self.0 + 1 < len {
            self.0 += 1;
        }
    }

    pub fn clamp(&mut self, len: usize) {
        self.0 = self.0.min(len.saturating_sub(1));
    }
}

pub struct Presenter<S: Surface> {
    surface: S,
    snapshots: mpsc::Receiver<Snapshot>,
    commands: mpsc::Receiver<KeyCommand>,
    lines: Vec<String>,
    global_count: u64,
    equipment_count: usize,
    scroll: ScrollPosition,
    refresh_interval: Duration,
    quiescence: Duration,
    last_snapshot: Instant,
}

impl<S: Surface> Presenter<S> {
    pub fn new(
        surface: S,
        snapshots: mpsc::Receiver<Snapshot>,
        commands: mpsc::Receiver<KeyCommand>,
        refresh_interval: Duration,
        quiescence: Duration,
    ) -> Self {
        Self {
            surface,
            snapshots,
            commands,
            lines: Vec::new(),
            global_count: 0,
            equipment_count: 0,
            scroll: ScrollPosition::default(),
            refresh_interval,
            quiescence,
            last_snapshot: Instant::now(),
        }
    }

    /// Render on a fixed cadence until cancelled, then restore the surface
    pub async fn run(mut self, cancel: CancellationToken) -> io::Result<()> {
        log::info!("Starting presenter (refresh: {}ms)", self.refresh_interval.as_millis());

        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Presenter cancelled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        log::error!("Render error: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        let finalized = self.surface.finalize();
        result.and(finalized)
    }

    pub fn tick(&mut self) -> io::Result<()> {
        self.surface.clear();
        self.draw_title();

        match self.snapshots.try_recv() {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(_) => self.note_quiescence(),
        }

        if let Ok(command) = self.commands.try_recv() {
            self.apply_command(command)?;
        }

        self.draw_lines()?;
        self.surface.show()
    }

    fn draw_title(&mut self) {
        let style = layout::title_style();
        for line in layout::title_lines(Local::now(), self.global_count, self.equipment_count) {
            self.surface.write_text(line.x, line.y, &line.text, style);
        }
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        log::info!("Received data size: {}", snapshot.equipment_count());

        self.lines = layout::render_lines(&snapshot);
        self.global_count = snapshot.global_count();
        self.equipment_count = snapshot.equipment_count();
        self.scroll.clamp(self.lines.len());
        self.last_snapshot = Instant::now();
    }

    fn note_quiescence(&mut self) {
        if self.last_snapshot.elapsed() >= self.quiescence {
            log::info!(
                "Timeout occurred, no data received for {}s",
                self.quiescence.as_secs()
            );
            self.last_snapshot = Instant::now();
        }
    }

    fn apply_command(&mut self, command: KeyCommand) -> io::Result<()> {
        log::debug!("Key command {:?} at position {}", command, self.scroll.get());

        match command {
            KeyCommand::ScrollUp => self.scroll.up(),
            KeyCommand::ScrollDown => self.scroll.down(self.lines.len()),
            KeyCommand::Clear => self.surface.clear(),
            KeyCommand::Sync => self.surface.sync()?,
        }
        Ok(())
    }

    fn draw_lines(&mut self) -> io::Result<()> {
        let (_, rows) = self.surface.size()?;
        let visible = rows.saturating_sub(HEADER_ROWS) as usize;
        let style = layout::text_style();

        self.scroll.clamp(self.lines.len());

        log::trace!(
            "draw_lines position={} visible={} rows={} len={}",
            self.scroll.get(),
            visible,
            rows,
            self.lines.len()
        );

        for (offset, line) in self
            .lines
            .iter()
            .skip(self.scroll.get())
            .take(visible)
            .enumerate()
        {
            self.surface
                .write_text(0, HEADER_ROWS + offset as u16, line, style);
        }
        Ok(())
    }

    pub fn scroll_position(&self) -> usize {
        self.scroll.get()
    }

    pub fn global_count(&self) -> u64 {
        self.global_count
    }

    /// Lines of the dataset currently on display
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
