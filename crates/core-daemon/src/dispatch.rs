//! Command dispatch.
//!
//! Maps one parsed command onto the cursor engine, the typing pipeline, and
//! the readiness flags, and turns the outcome into a response line. Nothing
//! here terminates the daemon: parse failures, bad parameters, and device
//! errors all become `{"ok":false,...}` while the session stays up.

use std::thread;
use std::time::Duration;

use core_config::Tunables;
use core_cursor::{CursorControl, PointingSink, SyncEngine};
use core_hid::{CharMap, CharStrokes, KeyStroke, Modifiers, modifier_named, named_key};
use core_proto::{Command, CursorMode, Response};
use tracing::warn;

use crate::typing::{KeyboardSink, TypingPipeline};

const LONG_PRESS_DEFAULT: Duration = Duration::from_millis(500);
const DRAG_DEFAULT: Duration = Duration::from_millis(1000);
const SWIPE_DEFAULT: Duration = Duration::from_millis(300);

/// Readiness flags surfaced by `status`.
pub trait StatusSource {
    fn keyboard_ready(&self) -> bool;
    fn pointing_ready(&self) -> bool;
}

/// Everything a command needs, borrowed for the session's lifetime.
pub struct Dispatcher<'a> {
    pub cursor: &'a dyn CursorControl,
    pub pointing: &'a dyn PointingSink,
    pub keyboard: &'a dyn KeyboardSink,
    pub status: &'a dyn StatusSource,
    pub charmap: &'a CharMap,
    pub tunables: &'a Tunables,
}

impl Dispatcher<'_> {
    /// Parse and execute one request line, producing the response line.
    pub fn handle_line(&self, line: &str) -> Response {
        match Command::parse_line(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!(target: "daemon.dispatch", error = %e, "request_rejected");
                Response::failure(e.to_string())
            }
        }
    }

    pub fn handle(&self, command: Command) -> Response {
        let engine = SyncEngine::new(self.cursor, self.pointing, self.tunables);
        match command {
            Command::Click { x, y, cursor_mode } => {
                self.pointer_action(x, y, || engine.click(x, y, cursor_mode))
            }
            Command::LongPress {
                x,
                y,
                duration_ms,
                cursor_mode,
            } => {
                let duration = duration_ms.map_or(LONG_PRESS_DEFAULT, Duration::from_millis);
                self.pointer_action(x, y, || engine.long_press(x, y, duration, cursor_mode))
            }
            Command::DoubleTap { x, y, cursor_mode } => {
                self.pointer_action(x, y, || engine.double_tap(x, y, cursor_mode))
            }
            Command::Drag {
                from_x,
                from_y,
                to_x,
                to_y,
                duration_ms,
                cursor_mode,
            } => {
                if let Some(err) = bad_point(from_x, from_y).or(bad_point(to_x, to_y)) {
                    return Response::failure(err);
                }
                let duration = duration_ms.map_or(DRAG_DEFAULT, Duration::from_millis);
                run(|| engine.drag((from_x, from_y), (to_x, to_y), duration, cursor_mode))
            }
            Command::Swipe {
                from_x,
                from_y,
                to_x,
                to_y,
                duration_ms,
            } => {
                if let Some(err) = bad_point(from_x, from_y).or(bad_point(to_x, to_y)) {
                    return Response::failure(err);
                }
                let duration = duration_ms.map_or(SWIPE_DEFAULT, Duration::from_millis);
                run(|| engine.swipe((from_x, from_y), (to_x, to_y), duration))
            }
            Command::Type {
                text,
                focus_x,
                focus_y,
            } => self.type_text(&engine, &text, focus_x.zip(focus_y)),
            Command::PressKey { key, modifiers } => self.press_key(&key, &modifiers),
            Command::Move { dx, dy } => run(|| engine.move_relative(dx, dy)),
            Command::Shake => self.shake(),
            Command::Status => {
                Response::status(self.status.keyboard_ready(), self.status.pointing_ready())
            }
        }
    }

    fn pointer_action(
        &self,
        x: f64,
        y: f64,
        act: impl FnOnce() -> anyhow::Result<()>,
    ) -> Response {
        match bad_point(x, y) {
            Some(err) => Response::failure(err),
            None => run(act),
        }
    }

    fn type_text(
        &self,
        engine: &SyncEngine<'_>,
        text: &str,
        focus: Option<(f64, f64)>,
    ) -> Response {
        if let Some((fx, fy)) = focus {
            if let Some(err) = bad_point(fx, fy) {
                return Response::failure(err);
            }
            if let Err(e) = engine.click(fx, fy, CursorMode::Sync) {
                return Response::failure(e.to_string());
            }
            thread::sleep(self.tunables.focus_settle);
        }
        let pipeline = TypingPipeline::new(self.keyboard, self.charmap, self.tunables);
        match pipeline.type_text(text) {
            Ok(skipped) => Response::typed(skipped),
            Err(e) => Response::failure(e.to_string()),
        }
    }

    fn press_key(&self, key: &str, modifier_names: &[String]) -> Response {
        let mut extra = Modifiers::empty();
        for name in modifier_names {
            match modifier_named(name) {
                Some(mask) => extra |= mask,
                None => return Response::failure(format!("unknown modifier: {name}")),
            }
        }

        let stroke = if let Some(code) = named_key(key) {
            KeyStroke::plain(code)
        } else {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => match self.charmap.resolve(c) {
                    CharStrokes::Single(stroke) => stroke,
                    _ => return Response::failure(format!("unknown key: {key}")),
                },
                _ => return Response::failure(format!("unknown key: {key}")),
            }
        };

        let pipeline = TypingPipeline::new(self.keyboard, self.charmap, self.tunables);
        run(|| pipeline.press_stroke(stroke, extra))
    }

    /// Shake gesture: the mirrored side binds it to ctrl+cmd+Z.
    fn shake(&self) -> Response {
        let pipeline = TypingPipeline::new(self.keyboard, self.charmap, self.tunables);
        run(|| {
            pipeline.press_stroke(
                KeyStroke::plain(core_hid::usage::Z),
                Modifiers::LEFT_CONTROL | Modifiers::LEFT_COMMAND,
            )
        })
    }
}

fn run(act: impl FnOnce() -> anyhow::Result<()>) -> Response {
    match act() {
        Ok(()) => Response::success(),
        Err(e) => Response::failure(e.to_string()),
    }
}

fn bad_point(x: f64, y: f64) -> Option<String> {
    if x.is_finite() && y.is_finite() && x >= 0.0 && y >= 0.0 {
        None
    } else {
        Some(format!("invalid coordinates: ({x}, {y})"))
    }
}
