//! Audio cues using the Web Audio API
//!
//! Both cues are synthesized from a single oscillator, no sound files.

use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

use crate::game::{AudioSink, SoundCue};

/// Peak gain of every cue
const PEAK_GAIN: f32 = 0.2;
/// Attack time to peak gain (seconds)
const ATTACK: f64 = 0.1;

/// Rising arpeggio for a cleared level: (frequency, offset seconds)
const WIN_NOTES: [(f32, f64); 4] = [(440.0, 0.0), (554.37, 0.2), (659.25, 0.4), (880.0, 0.6)];
const WIN_LENGTH: f64 = 1.0;

/// Falling sawtooth sweep for a crash
const LOSE_FROM: f32 = 440.0;
const LOSE_TO: f32 = 220.0;
const LOSE_LENGTH: f64 = 0.8;

pub struct AudioManager {
    ctx: Option<AudioContext>,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioManager {
    pub fn new() -> Self {
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self { ctx }
    }

    fn create_osc(
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Attack to peak, linear release to silence at `t + length`
    fn envelope(gain: &GainNode, t: f64, length: f64) {
        gain.gain().set_value_at_time(0.0, t).ok();
        gain.gain()
            .linear_ramp_to_value_at_time(PEAK_GAIN, t + ATTACK)
            .ok();
        gain.gain()
            .linear_ramp_to_value_at_time(0.0, t + length)
            .ok();
    }

    fn play_win(ctx: &AudioContext) {
        let Some((osc, gain)) = Self::create_osc(ctx, WIN_NOTES[0].0, OscillatorType::Sine) else {
            return;
        };
        let t = ctx.current_time();

        Self::envelope(&gain, t, WIN_LENGTH);
        for (freq, offset) in WIN_NOTES {
            osc.frequency().set_value_at_time(freq, t + offset).ok();
        }

        osc.start().ok();
        osc.stop_with_when(t + WIN_LENGTH).ok();
    }

    fn play_lose(ctx: &AudioContext) {
        let Some((osc, gain)) = Self::create_osc(ctx, LOSE_FROM, OscillatorType::Sawtooth) else {
            return;
        };
        let t = ctx.current_time();

        Self::envelope(&gain, t, LOSE_LENGTH);
        osc.frequency().set_value_at_time(LOSE_FROM, t).ok();
        osc.frequency()
            .linear_ramp_to_value_at_time(LOSE_TO, t + LOSE_LENGTH)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + LOSE_LENGTH).ok();
    }
}

impl AudioSink for AudioManager {
    fn play(&mut self, cue: SoundCue) {
        let Some(ctx) = &self.ctx else { return };

        // Browsers keep the context suspended until a user gesture
        if ctx.state() == web_sys::AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        match cue {
            SoundCue::Win => Self::play_win(ctx),
            SoundCue::Lose => Self::play_lose(ctx),
        }
    }
}
