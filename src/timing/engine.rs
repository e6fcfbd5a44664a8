//! Drift-free absolute-time tick scheduler.
//!
//! Generalizes the frame-counter modulo arithmetic of a fixed-BPM click
//! generator (`frame_counter % samples_per_beat == 0`) into an absolute
//! `anchor + tickIndex * tickInterval` grid: instead of comparing a
//! monotonically growing counter against a fixed period, each tick's
//! scheduled time is computed directly from its index, so scheduling error
//! never accumulates across reconfiguration or callback jitter.

use std::time::{Duration, Instant};

use super::MetronomeConfig;

/// One scheduled beat or subdivision tick, computed from an armed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueEvent {
    pub absolute_time: Instant,
    pub tick_index: u64,
    pub bar_index: u64,
    pub beat_in_bar: u32,
    pub subdiv_index_in_beat: u32,
    pub is_on_beat: bool,
    pub is_accent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Armed,
    Running,
}

/// Emits beat/subdivision [`DueEvent`]s at sample-accurate absolute times,
/// independent of how often or how jittery the caller's `tick()` loop is.
pub struct TimingEngine {
    state: EngineState,
    anchor: Instant,
    tick_interval: Duration,
    next_tick_index: u64,
    /// Cursor for the lookahead scheduler (`due_within_lookahead`), kept
    /// separate from `next_tick_index` (the observer-dispatch cursor) so
    /// clicks can be pre-committed to the audio device ahead of the tick
    /// that actually fires their beat/subdivision broadcast.
    next_audio_schedule_index: u64,
    ticks_per_beat: u32,
    beats_per_bar: u32,
    accents: Vec<bool>,
}

impl TimingEngine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Idle,
            anchor: Instant::now(),
            tick_interval: Duration::from_millis(500),
            next_tick_index: 0,
            next_audio_schedule_index: 0,
            ticks_per_beat: 1,
            beats_per_bar: 4,
            accents: vec![true, false, false, false],
        }
    }

    /// Set the next-tick grid such that tick 0 occurs at `anchor`.
    pub fn arm(&mut self, config: &MetronomeConfig, anchor: Instant) {
        self.anchor = anchor;
        self.tick_interval = tick_interval_for(config);
        self.next_tick_index = 0;
        self.next_audio_schedule_index = 0;
        self.ticks_per_beat = config.subdivision().divisor();
        self.beats_per_bar = config.time_signature().beats_per_bar();
        self.accents = config.accent_pattern().as_slice().to_vec();
        self.state = EngineState::Armed;
    }

    pub fn disarm(&mut self) {
        self.state = EngineState::Idle;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, EngineState::Armed | EngineState::Running)
    }

    /// Recompute the grid for a new config without losing phase: the
    /// fraction of the tick already in progress at `now` is preserved, so
    /// the next due tick still lands `remainingFraction * newInterval`
    /// after `now`.
    pub fn reconfigure(&mut self, config: &MetronomeConfig, now: Instant) {
        let new_interval = tick_interval_for(config);

        if self.state == EngineState::Idle {
            self.tick_interval = new_interval;
            self.ticks_per_beat = config.subdivision().divisor();
            self.beats_per_bar = config.time_signature().beats_per_bar();
            self.accents = config.accent_pattern().as_slice().to_vec();
            return;
        }

        let next_due_old = self.anchor + self.tick_interval * (self.next_tick_index as u32);
        let remaining_fraction = if next_due_old > now {
            let remaining = next_due_old - now;
            (remaining.as_secs_f64() / self.tick_interval.as_secs_f64()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let next_due_new = now + new_interval.mul_f64(remaining_fraction);

        // Preserve `next_tick_index` (elapsed tick count) instead of
        // resetting to 0, so bar/beat counting keeps going instead of
        // snapping back to bar 0 beat 1. Only the anchor moves, chosen so
        // the next due tick still lands at `next_due_new`:
        // anchor' = now - elapsedTicks * newTickInterval (spec §4.2).
        let elapsed_offset = new_interval * (self.next_tick_index as u32);
        self.anchor = next_due_new.checked_sub(elapsed_offset).unwrap_or(next_due_new);
        self.tick_interval = new_interval;
        self.ticks_per_beat = config.subdivision().divisor();
        self.beats_per_bar = config.time_signature().beats_per_bar();
        self.accents = config.accent_pattern().as_slice().to_vec();
        // The old grid's audio-lookahead cursor no longer means anything
        // against the new interval/anchor; re-sync it to the (preserved)
        // dispatch cursor so the next lookahead pass re-schedules from here.
        if self.next_audio_schedule_index < self.next_tick_index {
            self.next_audio_schedule_index = self.next_tick_index;
        }
    }

    /// Return every tick whose scheduled time is `<= now`, in order. Ticks
    /// already past `now` from a stall are all yielded, none coalesced.
    pub fn tick(&mut self, now: Instant) -> Vec<DueEvent> {
        if self.state == EngineState::Idle {
            return Vec::new();
        }
        self.state = EngineState::Running;

        let mut due = Vec::new();
        loop {
            let scheduled = self.anchor + self.tick_interval * (self.next_tick_index as u32);
            if scheduled > now {
                break;
            }
            due.push(self.due_event_for(self.next_tick_index, scheduled));
            self.next_tick_index += 1;
        }
        due
    }

    /// Return every tick whose scheduled time falls within `[now, now +
    /// window]`, advancing a separate cursor from `tick`'s observer-dispatch
    /// one. Lets the lookahead scheduler pre-commit clicks to the audio
    /// device ahead of when their beat/subdivision broadcast actually fires
    /// (spec §4.3's pre-scheduling window).
    pub fn due_within_lookahead(&mut self, now: Instant, window: Duration) -> Vec<DueEvent> {
        if self.state == EngineState::Idle {
            return Vec::new();
        }
        if self.next_audio_schedule_index < self.next_tick_index {
            self.next_audio_schedule_index = self.next_tick_index;
        }

        let horizon = now + window;
        let mut due = Vec::new();
        loop {
            let scheduled = self.anchor + self.tick_interval * (self.next_audio_schedule_index as u32);
            if scheduled > horizon {
                break;
            }
            due.push(self.due_event_for(self.next_audio_schedule_index, scheduled));
            self.next_audio_schedule_index += 1;
        }
        due
    }

    /// Silently advance the dispatch cursor past any ticks already behind
    /// `now`, without emitting events for them. Used when resuming from a
    /// suspend: ticks missed during the suspend window are dropped rather
    /// than replayed as a catch-up burst (spec §4.3 visibility lifecycle),
    /// unlike an ordinary stall, which `tick` always replays in full.
    pub fn skip_to(&mut self, now: Instant) {
        if self.state == EngineState::Idle {
            return;
        }
        loop {
            let scheduled = self.anchor + self.tick_interval * (self.next_tick_index as u32);
            if scheduled > now {
                break;
            }
            self.next_tick_index += 1;
        }
        if self.next_audio_schedule_index < self.next_tick_index {
            self.next_audio_schedule_index = self.next_tick_index;
        }
    }

    fn due_event_for(&self, tick_index: u64, absolute_time: Instant) -> DueEvent {
        let ticks_per_bar = (self.beats_per_bar as u64) * (self.ticks_per_beat as u64);
        let tick_in_bar = tick_index % ticks_per_bar;
        let beat_in_bar = (tick_in_bar / self.ticks_per_beat as u64) as u32;
        let subdiv_index_in_beat = (tick_in_bar % self.ticks_per_beat as u64) as u32;
        let bar_index = tick_index / ticks_per_bar;
        let is_on_beat = subdiv_index_in_beat == 0;
        let is_accent = is_on_beat && self.accents.get(beat_in_bar as usize).copied().unwrap_or(false);

        DueEvent {
            absolute_time,
            tick_index,
            bar_index,
            beat_in_bar,
            subdiv_index_in_beat,
            is_on_beat,
            is_accent,
        }
    }
}

impl Default for TimingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn tick_interval_for(config: &MetronomeConfig) -> Duration {
    let beat_interval = Duration::from_secs_f64(60.0 / config.bpm() as f64);
    let divisor = config.subdivision().divisor().max(1);
    beat_interval / divisor
}
