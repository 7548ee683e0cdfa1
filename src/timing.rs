//! Fixed-tick update loop, animation-frame render pump, and the
//! `remesh -> render -> update` ordering that drives one frame.
//!
//! Concurrency model: this crate runs on a single logical thread. The three
//! callbacks (`remesh`, `render`, `update`) are called synchronously from
//! whatever pump the host drives (its own `for` loop in tests, an
//! animation-frame callback in a real client); there is no background
//! thread pool, no async task queue, and no lock anywhere in this module.
//!
//! # Example
//! ```
//! use stratum::timing::Timing;
//!
//! let mut timing = Timing::new(60, 4);
//! let mut frames = 0;
//! for _ in 0..3 {
//!     timing.pump(1.0 / 60.0, |_dt| {}, || {}, || frames += 1);
//! }
//! assert_eq!(frames, 3);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

const METER_WINDOW: usize = 60;

/// Rolling-average performance meter over a fixed sample window.
#[derive(Default)]
pub struct Meter {
    samples: [f64; METER_WINDOW],
    count: usize,
    cursor: usize,
}

impl Meter {
    #[must_use]
    pub fn new() -> Self {
        Self { samples: [0.0; METER_WINDOW], count: 0, cursor: 0 }
    }

    pub fn record(&mut self, seconds: f64) {
        self.samples[self.cursor] = seconds;
        self.cursor = (self.cursor + 1) % METER_WINDOW;
        self.count = (self.count + 1).min(METER_WINDOW);
    }

    #[must_use]
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.samples[..self.count].iter().sum::<f64>() / self.count as f64
    }
}

/// Drives `update` (fixed `1000/ticks_per_second` ms grid, capped at
/// `ticks_per_frame` per pump) then `remesh` then `render`, each instrumented
/// by a 60-sample rolling meter. Any panic escaping a callback permanently
/// quarantines all three: they're replaced with no-ops and the panic is
/// logged at `error!`, since that log line is the only signal the world has
/// frozen.
pub struct Timing {
    ticks_per_second: u32,
    ticks_per_frame: u32,
    accumulator: f64,
    quarantined: bool,
    pub remesh_meter: Meter,
    pub render_meter: Meter,
    pub update_meter: Meter,
}

impl Timing {
    #[must_use]
    pub fn new(ticks_per_second: u32, ticks_per_frame: u32) -> Self {
        Self {
            ticks_per_second,
            ticks_per_frame,
            accumulator: 0.0,
            quarantined: false,
            remesh_meter: Meter::new(),
            render_meter: Meter::new(),
            update_meter: Meter::new(),
        }
    }

    #[must_use]
    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    fn tick_seconds(&self) -> f64 {
        1.0 / f64::from(self.ticks_per_second)
    }

    /// Run one frame: drain fixed-size update ticks (discarding any
    /// leftover accumulated time beyond the per-pump cap, to avoid a
    /// death-spiral), then remesh, then render. `dt` is the wall-clock
    /// seconds elapsed since the previous pump.
    ///
    /// If any callback has already panicked on a previous pump, this is a
    /// no-op — the world stays frozen until a new `Timing` is built.
    pub fn pump(&mut self, dt: f64, mut update: impl FnMut(f64), mut remesh: impl FnMut(), mut render: impl FnMut()) {
        if self.quarantined {
            return;
        }

        self.accumulator += dt;
        let tick = self.tick_seconds();
        let mut ticks_run = 0;
        while self.accumulator >= tick && ticks_run < self.ticks_per_frame {
            if !call_guarded("update", &mut self.update_meter, &mut self.quarantined, || update(tick)) {
                return;
            }
            self.accumulator -= tick;
            ticks_run += 1;
        }
        if ticks_run == self.ticks_per_frame {
            self.accumulator = 0.0;
        }

        if !call_guarded("remesh", &mut self.remesh_meter, &mut self.quarantined, &mut remesh) {
            return;
        }
        let _ = call_guarded("render", &mut self.render_meter, &mut self.quarantined, &mut render);
    }
}

/// Run `f`, timing it into `meter`, catching any panic. On panic, logs at
/// `error!` and sets `*quarantined`. Returns `false` if the callback
/// panicked, so the caller stops the current pump immediately, matching the
/// fixed `update -> remesh -> render` ordering.
fn call_guarded(name: &str, meter: &mut Meter, quarantined: &mut bool, f: impl FnOnce()) -> bool {
    let start = std::time::Instant::now();
    let result = catch_unwind(AssertUnwindSafe(f));
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(()) => {
            meter.record(elapsed);
            true
        }
        Err(payload) => {
            let message = panic_message(&payload);
            log::error!("{name} callback panicked, quarantining all callbacks: {message}");
            *quarantined = true;
            false
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_averages_recorded_samples() {
        let mut m = Meter::new();
        m.record(1.0);
        m.record(3.0);
        assert_eq!(m.average(), 2.0);
    }

    #[test]
    fn meter_window_caps_at_60_samples() {
        let mut m = Meter::new();
        for _ in 0..100 {
            m.record(1.0);
        }
        assert_eq!(m.count, METER_WINDOW);
        assert_eq!(m.average(), 1.0);
    }

    #[test]
    fn pump_runs_remesh_then_render_every_call() {
        let mut timing = Timing::new(60, 4);
        let mut order = Vec::new();
        timing.pump(
            1.0 / 60.0,
            |_| order.push("update"),
            || order.push("remesh"),
            || order.push("render"),
        );
        assert_eq!(order, vec!["update", "remesh", "render"]);
    }

    #[test]
    fn pump_caps_ticks_per_frame_and_discards_overflow() {
        let mut timing = Timing::new(60, 2);
        let mut ticks = 0;
        timing.pump(10.0, |_| ticks += 1, || {}, || {});
        assert_eq!(ticks, 2);
    }

    #[test]
    fn panicking_callback_quarantines_all_future_pumps() {
        let mut timing = Timing::new(60, 4);
        let mut renders = 0;

        timing.pump(1.0 / 60.0, |_| panic!("boom"), || {}, || renders += 1);
        assert!(timing.is_quarantined());
        assert_eq!(renders, 0);

        timing.pump(1.0 / 60.0, |_| {}, || {}, || renders += 1);
        assert_eq!(renders, 0);
    }
}
