//! The capability surface exposed to the hosting program.
//!
//! Each method follows the same discipline: permission check, window
//! resolution, coordinate validation, then exactly one (or a few, for
//! composites like `launch_app`) helper requests. Keyboard-bearing actions
//! activate the mirroring window first because the system routes HID events
//! to the frontmost window; read-only actions never steal focus.

use std::thread;
use std::time::Duration;

use core_config::{PermissionPolicy, Tunables};
use core_hid::{CharMap, segment_text};
use core_proto::{Command, CursorMode, Response};
use tracing::{debug, info, warn};

use crate::InputError;
use crate::bridge::WindowBridge;
use crate::client::HelperClient;

/// Result of a `type_text` call; `skipped` carries the scalar values of
/// characters the effective layout could not produce.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeOutcome {
    pub skipped: Vec<u32>,
}

pub struct Orchestrator<B: WindowBridge> {
    bridge: B,
    client: HelperClient,
    policy: PermissionPolicy,
    tunables: Tunables,
    reference_map: CharMap,
}

impl<B: WindowBridge> Orchestrator<B> {
    pub fn new(
        bridge: B,
        client: HelperClient,
        policy: PermissionPolicy,
        tunables: Tunables,
    ) -> Self {
        Self {
            bridge,
            client,
            policy,
            tunables,
            reference_map: CharMap::reference(),
        }
    }

    /// Capability names the hosting program should expose as tools. Denied
    /// capabilities are absent, not merely failing.
    pub fn visible_capabilities(&self) -> Vec<&'static str> {
        self.policy.visible_capabilities()
    }

    pub fn tap(&mut self, wx: f64, wy: f64) -> Result<(), InputError> {
        self.check("tap")?;
        let (x, y) = self.to_absolute(wx, wy)?;
        self.expect_ok(&Command::Click {
            x,
            y,
            cursor_mode: CursorMode::Sync,
        })
    }

    pub fn long_press(
        &mut self,
        wx: f64,
        wy: f64,
        duration: Option<Duration>,
    ) -> Result<(), InputError> {
        self.check("long_press")?;
        let (x, y) = self.to_absolute(wx, wy)?;
        self.expect_ok(&Command::LongPress {
            x,
            y,
            duration_ms: duration.map(|d| d.as_millis() as u64),
            cursor_mode: CursorMode::Sync,
        })
    }

    pub fn double_tap(&mut self, wx: f64, wy: f64) -> Result<(), InputError> {
        self.check("double_tap")?;
        let (x, y) = self.to_absolute(wx, wy)?;
        self.expect_ok(&Command::DoubleTap {
            x,
            y,
            cursor_mode: CursorMode::Sync,
        })
    }

    pub fn drag(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        duration: Option<Duration>,
    ) -> Result<(), InputError> {
        self.check("drag")?;
        let (from_x, from_y) = self.to_absolute(from.0, from.1)?;
        let (to_x, to_y) = self.to_absolute(to.0, to.1)?;
        self.expect_ok(&Command::Drag {
            from_x,
            from_y,
            to_x,
            to_y,
            duration_ms: duration.map(|d| d.as_millis() as u64),
            cursor_mode: CursorMode::Sync,
        })
    }

    pub fn swipe(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        duration: Option<Duration>,
    ) -> Result<(), InputError> {
        self.check("swipe")?;
        let (from_x, from_y) = self.to_absolute(from.0, from.1)?;
        let (to_x, to_y) = self.to_absolute(to.0, to.1)?;
        self.expect_ok(&Command::Swipe {
            from_x,
            from_y,
            to_x,
            to_y,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        })
    }

    /// Type text, optionally focusing a field with a pre-click at the given
    /// window-relative point.
    pub fn type_text(
        &mut self,
        text: &str,
        focus: Option<(f64, f64)>,
    ) -> Result<TypeOutcome, InputError> {
        self.check("type_text")?;
        let focus_abs = match focus {
            Some((wx, wy)) => Some(self.to_absolute(wx, wy)?),
            None => None,
        };
        self.activate()?;

        // Pre-flight warning: anything the reference layout cannot produce
        // is going to be skipped (the helper's substitution table may skip
        // more; its response is authoritative).
        for segment in segment_text(&self.reference_map, text) {
            if !segment.typeable {
                warn!(
                    target: "orchestrator",
                    run = segment.text.as_str(),
                    "untypeable_characters_will_be_skipped"
                );
            }
        }

        let response = self.client.request(&Command::Type {
            text: text.to_string(),
            focus_x: focus_abs.map(|p| p.0),
            focus_y: focus_abs.map(|p| p.1),
        })?;
        let skipped = Self::ok_or_helper_error(response)?.skipped.unwrap_or_default();
        if !skipped.is_empty() {
            info!(target: "orchestrator", skipped = skipped.len(), "characters_skipped");
        }
        Ok(TypeOutcome { skipped })
    }

    pub fn press_key(&mut self, key: &str, modifiers: &[&str]) -> Result<(), InputError> {
        self.check("press_key")?;
        self.activate()?;
        self.expect_ok(&Command::PressKey {
            key: key.to_string(),
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
        })
    }

    /// Pure relative pointer movement; deltas are not window-mapped.
    pub fn move_rel(&mut self, dx: i8, dy: i8) -> Result<(), InputError> {
        self.check("move")?;
        self.expect_ok(&Command::Move { dx, dy })
    }

    /// Shake gesture on the mirrored device.
    pub fn shake(&mut self) -> Result<(), InputError> {
        self.check("shake")?;
        self.activate()?;
        self.expect_ok(&Command::Shake)
    }

    /// Helper readiness; read-only, never steals focus.
    pub fn status(&mut self) -> Result<(bool, bool), InputError> {
        let response = Self::ok_or_helper_error(self.client.request(&Command::Status)?)?;
        Ok((
            response.keyboard_ready.unwrap_or(false),
            response.pointing_ready.unwrap_or(false),
        ))
    }

    /// Launch an app by name through Spotlight on the mirrored device.
    pub fn launch_app(&mut self, name: &str) -> Result<(), InputError> {
        self.check("launch_app")?;
        if !self.policy.allows_app(name) {
            warn!(target: "orchestrator", app = name, "launch_blocked");
            return Err(InputError::AppBlocked(name.to_string()));
        }
        info!(target: "orchestrator", app = name, "launch_app");
        self.spotlight_inner()?;
        thread::sleep(self.tunables.focus_settle);
        let outcome = self.type_text_unchecked(name)?;
        if !outcome.skipped.is_empty() {
            warn!(
                target: "orchestrator",
                app = name,
                skipped = outcome.skipped.len(),
                "app_name_partially_typed"
            );
        }
        thread::sleep(self.tunables.focus_settle);
        self.expect_ok(&Command::PressKey {
            key: "return".into(),
            modifiers: vec![],
        })
    }

    /// Home screen (the mirroring window binds it to cmd-1).
    pub fn home(&mut self) -> Result<(), InputError> {
        self.check("home")?;
        self.command_digit("1")
    }

    /// App switcher (cmd-2).
    pub fn app_switcher(&mut self) -> Result<(), InputError> {
        self.check("app_switcher")?;
        self.command_digit("2")
    }

    /// Spotlight search (cmd-3).
    pub fn spotlight(&mut self) -> Result<(), InputError> {
        self.check("spotlight")?;
        self.spotlight_inner()
    }

    fn spotlight_inner(&mut self) -> Result<(), InputError> {
        self.activate()?;
        self.expect_ok(&Command::PressKey {
            key: "3".into(),
            modifiers: vec!["command".into()],
        })
    }

    fn command_digit(&mut self, digit: &str) -> Result<(), InputError> {
        self.activate()?;
        self.expect_ok(&Command::PressKey {
            key: digit.into(),
            modifiers: vec!["command".into()],
        })
    }

    fn type_text_unchecked(&mut self, text: &str) -> Result<TypeOutcome, InputError> {
        let response = self.client.request(&Command::Type {
            text: text.to_string(),
            focus_x: None,
            focus_y: None,
        })?;
        let skipped = Self::ok_or_helper_error(response)?.skipped.unwrap_or_default();
        Ok(TypeOutcome { skipped })
    }

    fn check(&self, capability: &str) -> Result<(), InputError> {
        if self.policy.allows(capability) {
            Ok(())
        } else {
            debug!(target: "orchestrator", capability, "capability_denied");
            Err(InputError::PermissionDenied(capability.to_string()))
        }
    }

    fn activate(&self) -> Result<(), InputError> {
        self.bridge
            .ensure_frontmost()
            .map_err(|e| InputError::Activation(e.to_string()))
    }

    fn to_absolute(&self, wx: f64, wy: f64) -> Result<(f64, f64), InputError> {
        let geometry = self
            .bridge
            .window_geometry()
            .ok_or(InputError::WindowUnavailable)?;
        geometry
            .to_absolute(wx, wy)
            .ok_or(InputError::OutOfBounds { x: wx, y: wy })
    }

    fn expect_ok(&mut self, command: &Command) -> Result<(), InputError> {
        let response = self.client.request(command)?;
        Self::ok_or_helper_error(response).map(|_| ())
    }

    fn ok_or_helper_error(response: Response) -> Result<Response, InputError> {
        if response.ok {
            Ok(response)
        } else {
            Err(InputError::Helper(
                response.error.unwrap_or_else(|| "unspecified".into()),
            ))
        }
    }
}
