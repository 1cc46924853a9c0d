//! Keyboard emit pipeline.
//!
//! Turns chunker emissions into timed report sequences: press the batch,
//! hold, release everything, pause before the next batch. Dead-key pairs get
//! their own press/release per stroke with the compose delay in between.
//! Every path ends in an all-zero release report, so no key or modifier ever
//! leaks into the next request.

use std::thread;

use anyhow::Result;
use core_config::Tunables;
use core_hid::{CharMap, Emission, KeyStroke, KeyboardReport, Modifiers, chunk_text};
use tracing::{debug, trace};

/// Destination for keyboard reports.
pub trait KeyboardSink {
    fn post(&self, report: &KeyboardReport) -> Result<()>;
}

pub struct TypingPipeline<'a> {
    sink: &'a dyn KeyboardSink,
    map: &'a CharMap,
    tunables: &'a Tunables,
}

impl<'a> TypingPipeline<'a> {
    pub fn new(sink: &'a dyn KeyboardSink, map: &'a CharMap, tunables: &'a Tunables) -> Self {
        Self {
            sink,
            map,
            tunables,
        }
    }

    /// Type `text`, returning the scalar values of characters that were
    /// skipped as unrepresentable on the effective layout.
    pub fn type_text(&self, text: &str) -> Result<Vec<u32>> {
        let (emissions, skipped) =
            chunk_text(self.map, text, self.tunables.hid_typing_chunk_size);
        debug!(
            target: "daemon.typing",
            characters = text.chars().count(),
            emissions = emissions.len(),
            skipped = skipped.len(),
            "type_text"
        );
        for emission in emissions {
            match emission {
                Emission::Batch { modifiers, keys } => {
                    trace!(target: "daemon.typing", keys = keys.len(), mask = modifiers.bits(), "batch");
                    self.press_and_release(KeyboardReport::pressed(modifiers, &keys))?;
                    thread::sleep(self.tunables.keystroke_delay);
                }
                Emission::Compose { dead, base } => {
                    trace!(target: "daemon.typing", dead = dead.usage, base = base.usage, "compose");
                    self.press_and_release(stroke_report(dead))?;
                    thread::sleep(self.tunables.dead_key_delay);
                    self.press_and_release(stroke_report(base))?;
                    thread::sleep(self.tunables.keystroke_delay);
                }
            }
        }
        Ok(skipped)
    }

    /// One keystroke: the stroke's own modifiers OR'd with `extra`.
    pub fn press_stroke(&self, stroke: KeyStroke, extra: Modifiers) -> Result<()> {
        let report = KeyboardReport::pressed(stroke.modifiers | extra, &[stroke.usage]);
        self.press_and_release(report)?;
        thread::sleep(self.tunables.keystroke_delay);
        Ok(())
    }

    fn press_and_release(&self, report: KeyboardReport) -> Result<()> {
        self.sink.post(&report)?;
        thread::sleep(self.tunables.key_hold);
        self.sink.post(&KeyboardReport::release())
    }
}

fn stroke_report(stroke: KeyStroke) -> KeyboardReport {
    KeyboardReport::pressed(stroke.modifiers, &[stroke.usage])
}
