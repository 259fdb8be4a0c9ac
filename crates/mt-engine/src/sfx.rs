//! Priority-gated sound-effect overlay.
//!
//! Each channel has a depth-1 request slot. While an effect is active the
//! channel ignores music notes, so its interpreter keeps running the effect's
//! macro; once the lock runs out the next music note takes the channel back.

use mt_ir::SfxEntry;

/// A request to play a one-shot macro on a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SfxRequest {
    pub channel: u8,
    pub priority: u8,
    pub program: u8,
    /// Ticks the channel stays reserved after the effect starts
    pub lock_ticks: u16,
    pub note: u8,
    pub velocity: u8,
    pub detune: i8,
}

impl SfxRequest {
    pub fn new(channel: u8, priority: u8, program: u8, lock_ticks: u16) -> Self {
        Self {
            channel,
            priority,
            program,
            lock_ticks,
            note: 0,
            velocity: 15,
            detune: 0,
        }
    }

    pub fn from_entry(entry: &SfxEntry) -> Self {
        Self {
            channel: entry.channel,
            priority: entry.priority,
            program: entry.program,
            lock_ticks: entry.lock_ticks,
            note: entry.note,
            velocity: entry.velocity,
            detune: entry.detune,
        }
    }
}

/// Per-channel overlay state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SfxSlot {
    active: bool,
    priority: u8,
    lock: u16,
    pending: Option<SfxRequest>,
}

impl SfxSlot {
    /// Whether an effect (or a pattern lock) currently owns the channel.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn lock_remaining(&self) -> u16 {
        self.lock
    }

    pub fn pending(&self) -> Option<&SfxRequest> {
        self.pending.as_ref()
    }

    /// An accepted request that has not started yet ranks like an active one.
    pub fn accepts(&self, priority: u8) -> bool {
        let over_active = !self.active || priority >= self.priority || self.lock == 0;
        let over_pending = self.pending.map_or(true, |p| priority >= p.priority);
        over_active && over_pending
    }

    /// Queue `request`, replacing a pending one of no higher priority.
    /// Returns `false` if refused.
    pub fn offer(&mut self, request: SfxRequest) -> bool {
        if !self.accepts(request.priority) {
            return false;
        }
        self.pending = Some(request);
        true
    }

    /// Reserve the channel without starting a program.
    pub fn lock(&mut self, priority: u8, ticks: u16) {
        self.active = true;
        self.priority = priority;
        self.lock = ticks;
    }

    /// Per-tick bookkeeping: expire or count down the active lock, then hand
    /// back a pending request that should start now.
    pub fn advance(&mut self) -> Option<SfxRequest> {
        if self.active {
            if self.lock == 0 {
                self.active = false;
                self.priority = 0;
            } else {
                self.lock -= 1;
            }
        }
        let request = self.pending.take()?;
        self.active = true;
        self.priority = request.priority;
        self.lock = request.lock_ticks;
        Some(request)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
