//! Single-writer command queue between the parameter layer and the preview loop.
//!
//! Producers push commands whenever they like; the session drains the queue
//! exactly once per tick. Draining returns commands in a fixed order so the
//! tie-break between geometry changes and resets never depends on push order:
//! resize, retile, reset, hold, draw.

/// One request for the live preview accumulation buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Reallocate the surface at a new size multiplier (destroys progress).
    Resize(f32),
    /// Change tile geometry (destroys progress).
    Retile { tile_size: u32, tiling: bool },
    /// Restart the tile sequence for a new snapshot.
    Reset,
    /// Stop tile drawing while parameters are mid-edit.
    Hold,
    /// Resume tile drawing.
    Draw,
}

/// Commands left after draining, in application order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingCommands {
    pub resize: Option<f32>,
    pub retile: Option<(u32, bool)>,
    pub reset: bool,
    pub hold: bool,
    pub draw: bool,
}

impl PendingCommands {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Flatten back into the fixed application order.
    pub fn ordered(&self) -> Vec<Command> {
        let mut out = Vec::new();
        if let Some(m) = self.resize {
            out.push(Command::Resize(m));
        }
        if let Some((tile_size, tiling)) = self.retile {
            out.push(Command::Retile { tile_size, tiling });
        }
        if self.reset {
            out.push(Command::Reset);
        }
        if self.hold {
            out.push(Command::Hold);
        }
        if self.draw {
            out.push(Command::Draw);
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: PendingCommands,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command. Repeated geometry commands keep only the latest value.
    pub fn push(&mut self, command: Command) {
        match command {
            Command::Resize(m) => self.pending.resize = Some(m),
            Command::Retile { tile_size, tiling } => {
                self.pending.retile = Some((tile_size, tiling))
            }
            Command::Reset => self.pending.reset = true,
            // Hold and Draw cancel each other; the later one wins.
            Command::Hold => {
                self.pending.hold = true;
                self.pending.draw = false;
            }
            Command::Draw => {
                self.pending.draw = true;
                self.pending.hold = false;
            }
        }
    }

    /// Take everything queued since the last drain.
    pub fn drain(&mut self) -> PendingCommands {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Coalesces a burst of parameter edits (e.g. a slider drag) into one
/// hold at the start and one reset-and-draw at the end.
#[derive(Debug, Default)]
pub struct EditTracker {
    editing: bool,
}

impl EditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A parameter changed. Only the first change of a burst queues anything.
    pub fn on_edit(&mut self, queue: &mut CommandQueue) {
        if !self.editing {
            self.editing = true;
            queue.push(Command::Hold);
        }
    }

    /// The burst ended (pointer released). Restart accumulation once.
    pub fn on_edit_end(&mut self, queue: &mut CommandQueue) {
        if self.editing {
            self.editing = false;
            queue.push(Command::Reset);
            queue.push(Command::Draw);
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_ordered_before_reset() {
        let mut queue = CommandQueue::new();
        queue.push(Command::Reset);
        queue.push(Command::Resize(2.0));
        assert_eq!(
            queue.drain().ordered(),
            vec![Command::Resize(2.0), Command::Reset]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_last_resize_wins() {
        let mut queue = CommandQueue::new();
        queue.push(Command::Resize(8.0));
        queue.push(Command::Resize(0.5));
        let pending = queue.drain();
        assert_eq!(pending.resize, Some(0.5));
    }

    #[test]
    fn test_hold_then_draw_resolves_to_draw() {
        let mut queue = CommandQueue::new();
        queue.push(Command::Hold);
        queue.push(Command::Draw);
        let pending = queue.drain();
        assert!(pending.draw);
        assert!(!pending.hold);
    }

    #[test]
    fn test_edit_burst_coalesced() {
        let mut queue = CommandQueue::new();
        let mut edits = EditTracker::new();

        for _ in 0..50 {
            edits.on_edit(&mut queue);
        }
        assert!(edits.is_editing());
        assert_eq!(queue.drain().ordered(), vec![Command::Hold]);

        // Mid-drag edits after the first queue nothing
        edits.on_edit(&mut queue);
        assert!(queue.is_empty());

        edits.on_edit_end(&mut queue);
        assert!(!edits.is_editing());
        assert_eq!(
            queue.drain().ordered(),
            vec![Command::Reset, Command::Draw]
        );

        // A stray release with no edit in progress is ignored
        edits.on_edit_end(&mut queue);
        assert!(queue.is_empty());
    }
}
