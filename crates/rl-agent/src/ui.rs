//! Lock surface dispatch
//!
//! The lock surface belongs to the process main thread. Background tasks
//! never touch it; they send [`UiCommand`]s through a [`UiHandle`], and the
//! main thread drains them with [`UiPump::run_blocking`] until every handle
//! has been dropped.

use std::io::{self, Stderr, Write};

use tokio::sync::mpsc;

/// A request to change what the lock surface shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Show the lock surface with `message`, or update the message if it
    /// is already up
    Raise { message: String },
    /// Take the lock surface down
    Lower,
}

/// Sending half of the dispatch queue; cheap to clone
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiCommand>,
}

impl UiHandle {
    /// Queue a command; returns false once the pump has gone away
    pub fn send(&self, command: UiCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(mpsc::error::SendError(command)) => {
                tracing::debug!("UI pump gone, dropping {:?}", command);
                false
            }
        }
    }

    pub fn raise(&self, message: impl Into<String>) -> bool {
        self.send(UiCommand::Raise {
            message: message.into(),
        })
    }

    pub fn lower(&self) -> bool {
        self.send(UiCommand::Lower)
    }
}

/// Receiving half of the dispatch queue, owned by the main thread
pub struct UiPump {
    rx: mpsc::UnboundedReceiver<UiCommand>,
}

/// Create a dispatch queue
pub fn channel() -> (UiHandle, UiPump) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiPump { rx })
}

impl UiPump {
    /// Apply commands to `surface` until every handle is dropped.
    ///
    /// Blocks the calling thread; must not be called from inside the async
    /// runtime. Returns the number of commands applied.
    pub fn run_blocking<S: LockSurface + ?Sized>(mut self, surface: &mut S) -> usize {
        let mut applied = 0;
        while let Some(command) = self.rx.blocking_recv() {
            apply(surface, command);
            applied += 1;
        }
        tracing::debug!("UI pump stopped after {} command(s)", applied);
        applied
    }

    /// Apply whatever is queued right now without blocking
    pub fn drain<S: LockSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.rx.try_recv() {
            apply(surface, command);
            applied += 1;
        }
        applied
    }
}

fn apply<S: LockSurface + ?Sized>(surface: &mut S, command: UiCommand) {
    tracing::debug!("Applying {:?}", command);
    match command {
        UiCommand::Raise { message } => surface.raise(&message),
        UiCommand::Lower => surface.lower(),
    }
}

/// Something that can cover the screen. Only used from the main thread.
pub trait LockSurface {
    /// Show the surface with `message`
    fn raise(&mut self, message: &str);

    /// Hide the surface
    fn lower(&mut self);

    /// Whether the surface is currently up
    fn is_raised(&self) -> bool;
}

/// Lock surface that renders a banner to a terminal stream
pub struct ConsoleSurface<W: Write = Stderr> {
    out: W,
    raised: bool,
}

impl ConsoleSurface<Stderr> {
    /// Render to stderr
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl<W: Write> ConsoleSurface<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, raised: false }
    }

    /// The underlying writer
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn render(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to render lock surface: {}", e);
        }
    }
}

impl<W: Write> LockSurface for ConsoleSurface<W> {
    fn raise(&mut self, message: &str) {
        let rule = "=".repeat(60);
        let mut banner = format!("\n{}\n  LOCKED\n\n", rule);
        for line in message.lines() {
            banner.push_str("  ");
            banner.push_str(line);
            banner.push('\n');
        }
        banner.push_str(&rule);
        banner.push('\n');

        self.render(&banner);
        if !self.raised {
            tracing::info!("Lock surface raised");
        }
        self.raised = true;
    }

    fn lower(&mut self) {
        if !self.raised {
            return;
        }
        self.render("\n  Unlocked\n\n");
        self.raised = false;
        tracing::info!("Lock surface lowered");
    }

    fn is_raised(&self) -> bool {
        self.raised
    }
}

/// Surface that records what it was asked to do
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    pub commands: Vec<UiCommand>,
    raised: bool,
    transitions: usize,
}

#[cfg(test)]
impl RecordingSurface {
    /// Number of times the surface actually went up or down
    pub fn transitions(&self) -> usize {
        self.transitions
    }
}

#[cfg(test)]
impl LockSurface for RecordingSurface {
    fn raise(&mut self, message: &str) {
        self.commands.push(UiCommand::Raise {
            message: message.to_string(),
        });
        if !self.raised {
            self.transitions += 1;
        }
        self.raised = true;
    }

    fn lower(&mut self) {
        self.commands.push(UiCommand::Lower);
        if self.raised {
            self.transitions += 1;
        }
        self.raised = false;
    }

    fn is_raised(&self) -> bool {
        self.raised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_surface_renders_message() {
        let mut surface = ConsoleSurface::with_writer(Vec::new());
        surface.raise("Back soon\nCall IT");
        assert!(surface.is_raised());

        let text = String::from_utf8(surface.writer().clone()).unwrap();
        assert!(text.contains("LOCKED"));
        assert!(text.contains("  Back soon\n  Call IT\n"));

        surface.lower();
        assert!(!surface.is_raised());
    }

    #[test]
    fn test_lower_when_not_raised_is_silent() {
        let mut surface = ConsoleSurface::with_writer(Vec::new());
        surface.lower();
        assert!(surface.writer().is_empty());
    }

    #[test]
    fn test_pump_applies_in_order() {
        let (handle, mut pump) = channel();
        let mut surface = ConsoleSurface::with_writer(Vec::new());

        assert!(handle.raise("one"));
        assert!(handle.lower());
        assert!(handle.raise("two"));

        assert_eq!(pump.drain(&mut surface), 3);
        assert!(surface.is_raised());
        assert_eq!(pump.drain(&mut surface), 0);
    }

    #[test]
    fn test_run_blocking_returns_when_handles_drop() {
        let (handle, pump) = channel();
        let sender = std::thread::spawn(move || {
            handle.raise("locked");
            handle.lower();
        });

        let mut surface = ConsoleSurface::with_writer(Vec::new());
        let applied = pump.run_blocking(&mut surface);
        sender.join().unwrap();

        assert_eq!(applied, 2);
        assert!(!surface.is_raised());
    }

    #[test]
    fn test_send_after_pump_dropped() {
        let (handle, pump) = channel();
        drop(pump);
        assert!(!handle.lower());
    }
}
