//! The gesture engine.
//!
//! Every buttoned gesture (click, long press, double tap, drag) runs inside
//! the sync sequence; swipe and relative movement bypass it entirely since
//! wheel and delta reports do not depend on the cursor position being exact.
//! The physical mouse is re-associated even when the action fails partway.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use core_config::Tunables;
use core_hid::{Buttons, PointingReport};
use core_proto::CursorMode;
use tracing::{debug, trace};

use crate::{CursorControl, PointingSink};

/// Floor applied to `long_press` durations.
const LONG_PRESS_MIN: Duration = Duration::from_millis(100);

/// Floor applied to `drag` durations.
const DRAG_MIN: Duration = Duration::from_millis(200);

pub struct SyncEngine<'a> {
    cursor: &'a dyn CursorControl,
    sink: &'a dyn PointingSink,
    tunables: &'a Tunables,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        cursor: &'a dyn CursorControl,
        sink: &'a dyn PointingSink,
        tunables: &'a Tunables,
    ) -> Self {
        Self {
            cursor,
            sink,
            tunables,
        }
    }

    /// Single primary-button press at `(x, y)`.
    pub fn click(&self, x: f64, y: f64, mode: CursorMode) -> Result<()> {
        debug!(target: "cursor", x, y, ?mode, "click");
        self.with_sync(x, y, mode, || self.press_and_release(self.tunables.click_hold))
    }

    /// Press and hold at `(x, y)`; durations below the floor are raised to it.
    pub fn long_press(&self, x: f64, y: f64, duration: Duration, mode: CursorMode) -> Result<()> {
        let hold = duration.max(LONG_PRESS_MIN);
        debug!(target: "cursor", x, y, hold_ms = hold.as_millis() as u64, "long_press");
        self.with_sync(x, y, mode, || self.press_and_release(hold))
    }

    /// Two press/release cycles with the configured gap.
    pub fn double_tap(&self, x: f64, y: f64, mode: CursorMode) -> Result<()> {
        debug!(target: "cursor", x, y, "double_tap");
        self.with_sync(x, y, mode, || {
            self.press_and_release(self.tunables.double_tap_hold)?;
            thread::sleep(self.tunables.double_tap_gap);
            self.press_and_release(self.tunables.double_tap_hold)
        })
    }

    /// Button-down at `from`, interpolated warp+delta steps to `to`, release.
    /// The initial hold gives the target's drag recognition time to engage.
    pub fn drag(
        &self,
        from: (f64, f64),
        to: (f64, f64),
        duration: Duration,
        mode: CursorMode,
    ) -> Result<()> {
        let duration = duration.max(DRAG_MIN);
        let steps = self.tunables.drag_interpolation_steps.max(1);
        let step_sleep = duration / steps;
        debug!(
            target: "cursor",
            from_x = from.0, from_y = from.1, to_x = to.0, to_y = to.1,
            steps, duration_ms = duration.as_millis() as u64,
            "drag"
        );
        self.with_sync(from.0, from.1, mode, || {
            self.sink.post(&PointingReport::buttons(Buttons::PRIMARY))?;
            thread::sleep(self.tunables.drag_mode_hold);

            let mut prev = from;
            for i in 1..=steps {
                let t = f64::from(i) / f64::from(steps);
                let target = (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
                self.cursor.warp(target.0, target.1)?;
                let report = PointingReport {
                    buttons: Buttons::PRIMARY,
                    x: saturate(target.0 - prev.0),
                    y: saturate(target.1 - prev.1),
                    ..PointingReport::default()
                };
                trace!(target: "cursor", step = i, dx = report.x, dy = report.y, "drag_step");
                self.sink.post(&report)?;
                prev = target;
                thread::sleep(step_sleep);
            }

            self.sink.post(&PointingReport::default())?;
            thread::sleep(self.tunables.cursor_settle);
            Ok(())
        })
    }

    /// Scroll-wheel reports along the vector; no buttons, no warping.
    pub fn swipe(&self, from: (f64, f64), to: (f64, f64), duration: Duration) -> Result<()> {
        let steps = self.tunables.swipe_interpolation_steps.max(1);
        let step_sleep = duration / steps;
        let scale = self.tunables.scroll_pixel_scale;
        let step_dx = (to.0 - from.0) / f64::from(steps);
        let step_dy = (to.1 - from.1) / f64::from(steps);
        let report = PointingReport::wheel(saturate(step_dy / scale), saturate(step_dx / scale));
        debug!(
            target: "cursor",
            steps,
            vertical_wheel = report.vertical_wheel,
            horizontal_wheel = report.horizontal_wheel,
            "swipe"
        );
        for _ in 0..steps {
            self.sink.post(&report)?;
            thread::sleep(step_sleep);
        }
        Ok(())
    }

    /// One relative-movement report, bypassing the sync sequence.
    pub fn move_relative(&self, dx: i8, dy: i8) -> Result<()> {
        debug!(target: "cursor", dx, dy, "move_relative");
        self.sink.post(&PointingReport::movement(dx, dy))
    }

    /// Save → dissociate → warp → settle → nudge → act → (restore) →
    /// re-associate. Re-association always runs, even when the action fails.
    fn with_sync(
        &self,
        x: f64,
        y: f64,
        mode: CursorMode,
        act: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let saved = self.cursor.position()?;
        self.cursor.set_associated(false)?;
        let outcome: Result<()> = (|| {
            self.cursor.warp(x, y)?;
            thread::sleep(self.tunables.cursor_settle);
            self.nudge()?;
            act()?;
            if mode == CursorMode::Sync {
                self.cursor.warp(saved.0, saved.1)?;
            }
            Ok(())
        })();
        let reassociated = self.cursor.set_associated(true);
        outcome.and(reassociated)
    }

    /// Force the service's internal position tracker to reconcile with the
    /// warped cursor. Net visible movement is zero.
    fn nudge(&self) -> Result<()> {
        self.sink.post(&PointingReport::movement(1, 0))?;
        thread::sleep(self.tunables.nudge_settle);
        self.sink.post(&PointingReport::movement(-1, 0))?;
        thread::sleep(self.tunables.cursor_settle);
        Ok(())
    }

    fn press_and_release(&self, hold: Duration) -> Result<()> {
        self.sink.post(&PointingReport::buttons(Buttons::PRIMARY))?;
        thread::sleep(hold);
        self.sink.post(&PointingReport::default())?;
        thread::sleep(self.tunables.cursor_settle);
        Ok(())
    }
}

/// Round to the nearest integer and clamp into the signed 8-bit range.
fn saturate(value: f64) -> i8 {
    value.round().clamp(f64::from(i8::MIN), f64::from(i8::MAX)) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        Position,
        Warp(f64, f64),
        Associate(bool),
        Post(PointingReport),
    }

    /// In-memory double for both traits; records the operation sequence.
    struct Recorder {
        events: RefCell<Vec<Ev>>,
        cursor_at: (f64, f64),
        fail_warp: bool,
    }

    impl Recorder {
        fn new(cursor_at: (f64, f64)) -> Self {
            Self {
                events: RefCell::new(Vec::new()),
                cursor_at,
                fail_warp: false,
            }
        }

        fn events(&self) -> Vec<Ev> {
            self.events.borrow().clone()
        }

        fn posts(&self) -> Vec<PointingReport> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Ev::Post(report) => Some(report),
                    _ => None,
                })
                .collect()
        }
    }

    impl CursorControl for Recorder {
        fn position(&self) -> Result<(f64, f64)> {
            self.events.borrow_mut().push(Ev::Position);
            Ok(self.cursor_at)
        }
        fn warp(&self, x: f64, y: f64) -> Result<()> {
            if self.fail_warp {
                bail!("warp rejected");
            }
            self.events.borrow_mut().push(Ev::Warp(x, y));
            Ok(())
        }
        fn set_associated(&self, associated: bool) -> Result<()> {
            self.events.borrow_mut().push(Ev::Associate(associated));
            Ok(())
        }
    }

    impl PointingSink for Recorder {
        fn post(&self, report: &PointingReport) -> Result<()> {
            self.events.borrow_mut().push(Ev::Post(*report));
            Ok(())
        }
    }

    /// Tunables with every sleep zeroed so tests run instantly.
    fn fast() -> Tunables {
        Tunables {
            cursor_settle: Duration::ZERO,
            nudge_settle: Duration::ZERO,
            click_hold: Duration::ZERO,
            double_tap_hold: Duration::ZERO,
            double_tap_gap: Duration::ZERO,
            drag_mode_hold: Duration::ZERO,
            keystroke_delay: Duration::ZERO,
            key_hold: Duration::ZERO,
            dead_key_delay: Duration::ZERO,
            focus_settle: Duration::ZERO,
            ..Tunables::default()
        }
    }

    fn down() -> PointingReport {
        PointingReport::buttons(Buttons::PRIMARY)
    }

    fn up() -> PointingReport {
        PointingReport::default()
    }

    #[test]
    fn click_runs_the_full_sync_sequence() {
        let rec = Recorder::new((50.0, 60.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .click(600.0, 500.0, CursorMode::Sync)
            .unwrap();
        assert_eq!(
            rec.events(),
            vec![
                Ev::Position,
                Ev::Associate(false),
                Ev::Warp(600.0, 500.0),
                Ev::Post(PointingReport::movement(1, 0)),
                Ev::Post(PointingReport::movement(-1, 0)),
                Ev::Post(down()),
                Ev::Post(up()),
                Ev::Warp(50.0, 60.0),
                Ev::Associate(true),
            ]
        );
    }

    #[test]
    fn leave_mode_skips_the_restore_warp() {
        let rec = Recorder::new((5.0, 5.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .click(100.0, 100.0, CursorMode::Leave)
            .unwrap();
        let warps: Vec<_> = rec
            .events()
            .into_iter()
            .filter(|e| matches!(e, Ev::Warp(..)))
            .collect();
        assert_eq!(warps, vec![Ev::Warp(100.0, 100.0)]);
        assert_eq!(rec.events().last(), Some(&Ev::Associate(true)));
    }

    #[test]
    fn sync_mode_restores_the_saved_position() {
        let rec = Recorder::new((321.0, 123.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .double_tap(10.0, 20.0, CursorMode::Sync)
            .unwrap();
        let last_warp = rec
            .events()
            .into_iter()
            .rev()
            .find(|e| matches!(e, Ev::Warp(..)));
        assert_eq!(last_warp, Some(Ev::Warp(321.0, 123.0)));
    }

    #[test]
    fn long_press_enforces_the_minimum_hold() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = fast();
        let start = Instant::now();
        SyncEngine::new(&rec, &rec, &tunables)
            .long_press(1.0, 1.0, Duration::from_millis(10), CursorMode::Sync)
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn double_tap_presses_twice() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .double_tap(1.0, 1.0, CursorMode::Sync)
            .unwrap();
        let downs = rec.posts().iter().filter(|r| **r == down()).count();
        let ups = rec.posts().iter().filter(|r| **r == up()).count();
        assert_eq!(downs, 2);
        assert_eq!(ups, 2);
    }

    #[test]
    fn drag_holds_the_button_across_interpolation() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = Tunables {
            drag_interpolation_steps: 4,
            ..fast()
        };
        SyncEngine::new(&rec, &rec, &tunables)
            .drag((0.0, 0.0), (40.0, 0.0), Duration::from_millis(200), CursorMode::Sync)
            .unwrap();

        // Warps: action target, then the four interpolation points, then restore.
        let warps: Vec<Ev> = rec
            .events()
            .into_iter()
            .filter(|e| matches!(e, Ev::Warp(..)))
            .collect();
        assert_eq!(
            warps,
            vec![
                Ev::Warp(0.0, 0.0),
                Ev::Warp(10.0, 0.0),
                Ev::Warp(20.0, 0.0),
                Ev::Warp(30.0, 0.0),
                Ev::Warp(40.0, 0.0),
                Ev::Warp(0.0, 0.0),
            ]
        );

        let posts = rec.posts();
        // Nudge, button-down, four moving steps, release.
        assert_eq!(posts.len(), 2 + 1 + 4 + 1);
        for step in &posts[3..7] {
            assert_eq!(step.buttons, Buttons::PRIMARY);
            assert_eq!(step.x, 10);
            assert_eq!(step.y, 0);
        }
        assert_eq!(posts.last(), Some(&up()));
    }

    #[test]
    fn drag_saturates_step_deltas() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = Tunables {
            drag_interpolation_steps: 2,
            ..fast()
        };
        SyncEngine::new(&rec, &rec, &tunables)
            .drag((0.0, 0.0), (0.0, 1000.0), Duration::from_millis(200), CursorMode::Sync)
            .unwrap();
        let steps: Vec<PointingReport> = rec
            .posts()
            .into_iter()
            .filter(|r| r.buttons == Buttons::PRIMARY && (r.x != 0 || r.y != 0))
            .collect();
        assert_eq!(steps.len(), 2);
        for step in steps {
            assert_eq!(step.y, 127);
        }
    }

    #[test]
    fn swipe_emits_wheel_reports_without_sync() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .swipe((200.0, 700.0), (200.0, 100.0), Duration::from_millis(0))
            .unwrap();
        let events = rec.events();
        assert!(events.iter().all(|e| matches!(e, Ev::Post(_))));
        let posts = rec.posts();
        assert_eq!(posts.len(), 20);
        for report in posts {
            assert_eq!(report.buttons, Buttons::empty());
            assert_eq!(report.vertical_wheel, -4);
            assert_eq!(report.horizontal_wheel, 0);
            assert_eq!((report.x, report.y), (0, 0));
        }
    }

    #[test]
    fn move_relative_is_a_single_report() {
        let rec = Recorder::new((0.0, 0.0));
        let tunables = fast();
        SyncEngine::new(&rec, &rec, &tunables)
            .move_relative(-5, 7)
            .unwrap();
        assert_eq!(rec.events(), vec![Ev::Post(PointingReport::movement(-5, 7))]);
    }

    #[test]
    fn failure_mid_action_still_reassociates() {
        let mut rec = Recorder::new((0.0, 0.0));
        rec.fail_warp = true;
        let tunables = fast();
        let result = SyncEngine::new(&rec, &rec, &tunables).click(1.0, 1.0, CursorMode::Sync);
        assert!(result.is_err());
        assert_eq!(rec.events().last(), Some(&Ev::Associate(true)));
    }

    #[test]
    fn saturation_rounds_then_clamps() {
        assert_eq!(saturate(-3.75), -4);
        assert_eq!(saturate(3.4), 3);
        assert_eq!(saturate(500.0), 127);
        assert_eq!(saturate(-500.0), -128);
        assert_eq!(saturate(0.0), 0);
    }
}
