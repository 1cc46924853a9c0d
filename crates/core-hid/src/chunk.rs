//! Text chunking and segmentation.
//!
//! A chunk is a batch of characters emitted as one keyboard report: up to the
//! configured chunk size (and never more than the report's 32 slots), sharing
//! one combined modifier mask. A character whose required mask conflicts with
//! the chunk's (both non-empty and different) starts a new chunk, so a run of
//! shifted characters never shares a report with an option-bearing one.
//! Dead-key compositions cannot ride in a batch at all; they surface as their
//! own emission so the caller can insert the compose delay between strokes.

use tracing::trace;

use crate::charmap::{CharMap, CharStrokes, KeyStroke};
use crate::report::{KEYBOARD_SLOTS, Modifiers};

/// One unit of keyboard output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// One report pressing `keys` under `modifiers`, then a release.
    Batch {
        modifiers: Modifiers,
        keys: Vec<u16>,
    },
    /// Dead key, compose delay, base key, then a release.
    Compose { dead: KeyStroke, base: KeyStroke },
}

/// A maximal run of consecutively typeable or untypeable characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub typeable: bool,
}

/// Split `text` into typeable and skipped runs against `map`.
pub fn segment_text(map: &CharMap, text: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for c in text.chars() {
        let typeable = map.is_typeable(c);
        match segments.last_mut() {
            Some(seg) if seg.typeable == typeable => seg.text.push(c),
            _ => segments.push(Segment {
                text: c.to_string(),
                typeable,
            }),
        }
    }
    segments
}

/// Translate `text` into emissions plus the scalar values of every skipped
/// character, preserving input order across both.
pub fn chunk_text(map: &CharMap, text: &str, chunk_size: usize) -> (Vec<Emission>, Vec<u32>) {
    fn flush(emissions: &mut Vec<Emission>, keys: &mut Vec<u16>, mask: &mut Modifiers) {
        if !keys.is_empty() {
            emissions.push(Emission::Batch {
                modifiers: *mask,
                keys: std::mem::take(keys),
            });
            *mask = Modifiers::empty();
        }
    }

    let capacity = chunk_size.clamp(1, KEYBOARD_SLOTS);
    let mut emissions = Vec::new();
    let mut skipped = Vec::new();
    let mut pending_keys: Vec<u16> = Vec::new();
    let mut pending_mask = Modifiers::empty();

    for c in text.chars() {
        match map.resolve(c) {
            CharStrokes::Skip => {
                trace!(target: "hid.chunk", character = c as u32, "skip_untypeable");
                skipped.push(c as u32);
            }
            CharStrokes::Compose { dead, base } => {
                flush(&mut emissions, &mut pending_keys, &mut pending_mask);
                emissions.push(Emission::Compose { dead, base });
            }
            CharStrokes::Single(stroke) => {
                let conflicting = !stroke.modifiers.is_empty()
                    && !pending_mask.is_empty()
                    && stroke.modifiers != pending_mask;
                if pending_keys.len() == capacity || conflicting {
                    flush(&mut emissions, &mut pending_keys, &mut pending_mask);
                }
                pending_keys.push(stroke.usage);
                pending_mask |= stroke.modifiers;
            }
        }
    }
    flush(&mut emissions, &mut pending_keys, &mut pending_mask);

    (emissions, skipped)
}
