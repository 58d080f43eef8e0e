//! LED Controller

use crate::pins::{Led, LedPins, BRIGHTNESS_DAYLIGHT, BRIGHTNESS_FULL};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use timer::Timer;
use tracing::{debug, warn};

/// Toggles that make up the setup-complete sequence (three on/off cycles)
const SETUP_COMPLETE_TOGGLES: u8 = 6;

/// Blink periods of the animated patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkIntervals {
    pub lateral: Duration,
    pub setup_complete: Duration,
    pub turn_signal: Duration,
}

impl Default for BlinkIntervals {
    fn default() -> Self {
        Self {
            lateral: Duration::from_millis(1000),
            setup_complete: Duration::from_millis(300),
            turn_signal: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlueMode {
    Off,
    Lateral,
    Autonomous,
    SetupComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YellowMode {
    Off,
    Hazard,
    Left,
    Right,
}

struct LedState<P> {
    pins: P,
    blue: BlueMode,
    blue_on: bool,
    setup_toggles: u8,
    /// Mode to enter once the setup-complete sequence ends
    setup_next: BlueMode,
    yellow: YellowMode,
    yellow_on: bool,
    headlight: u8,
    full_beam: bool,
    brake: u8,
    braking: bool,
}

impl<P: LedPins> LedState<P> {
    fn set_blue(&mut self, on: bool) {
        self.blue_on = on;
        self.pins.write(Led::Autonomous, on);
    }

    fn toggle_blue(&mut self) {
        let on = !self.blue_on;
        self.set_blue(on);
    }

    fn toggle_signals(&mut self) {
        self.yellow_on = !self.yellow_on;
        let (left, right) = match self.yellow {
            YellowMode::Hazard => (self.yellow_on, self.yellow_on),
            YellowMode::Left => (self.yellow_on, false),
            YellowMode::Right => (false, self.yellow_on),
            YellowMode::Off => (false, false),
        };
        self.pins.write(Led::SignalLeft, left);
        self.pins.write(Led::SignalRight, right);
    }

    /// Headlights on a blinking side stay dark
    fn apply_headlights(&mut self) {
        let level = if self.full_beam {
            BRIGHTNESS_FULL
        } else {
            self.headlight
        };
        let (left_dark, right_dark) = match self.yellow {
            YellowMode::Hazard => (true, true),
            YellowMode::Left => (true, false),
            YellowMode::Right => (false, true),
            YellowMode::Off => (false, false),
        };
        self.pins.pwm(Led::HeadlightLeft, if left_dark { 0 } else { level });
        self.pins.pwm(Led::HeadlightRight, if right_dark { 0 } else { level });
    }

    fn apply_brake(&mut self) {
        let level = if self.braking { BRIGHTNESS_FULL } else { self.brake };
        self.pins.pwm(Led::BrakeLight, level);
    }
}

struct Shared<P> {
    state: Mutex<LedState<P>>,
    /// Serializes blue mode changes; never taken by timer callbacks except
    /// the final setup tick, after its own timer is stopped
    blue_transition: Mutex<()>,
    intervals: BlinkIntervals,
    lateral_timer: Timer,
    setup_timer: Timer,
    signal_timer: Timer,
}

impl<P: LedPins> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, LedState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self) -> MutexGuard<'_, ()> {
        self.blue_transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a blue mode; deferred while the setup sequence runs
    fn request_blue(self: &Arc<Self>, mode: BlueMode) {
        let _transition = self.transition();
        {
            let mut state = self.lock();
            if state.blue == BlueMode::SetupComplete {
                debug!("Lights: {:?} deferred until setup sequence ends", mode);
                state.setup_next = mode;
                return;
            }
            if state.blue == mode {
                return;
            }
        }
        self.enter_blue(mode);
    }

    // Timers are only touched without the state lock held: their callbacks
    // take it too.
    fn enter_blue(self: &Arc<Self>, mode: BlueMode) {
        match mode {
            BlueMode::Off | BlueMode::Autonomous => {
                self.lock().blue = mode;
                self.lateral_timer.stop();
                self.lock().set_blue(mode == BlueMode::Autonomous);
            }
            BlueMode::Lateral => {
                {
                    let mut state = self.lock();
                    state.blue = mode;
                    state.toggle_blue();
                }
                let weak = Arc::downgrade(self);
                let armed = self.lateral_timer.set_interval(
                    move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.lock().toggle_blue();
                        }
                    },
                    self.intervals.lateral,
                );
                if let Err(e) = armed {
                    warn!("Lights: {}", e);
                }
            }
            BlueMode::SetupComplete => {
                {
                    let mut state = self.lock();
                    state.setup_next = state.blue;
                    state.blue = mode;
                    state.setup_toggles = 0;
                }
                self.lateral_timer.stop();
                let weak = Arc::downgrade(self);
                let armed = self.setup_timer.set_interval(
                    move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.setup_tick();
                        }
                    },
                    self.intervals.setup_complete,
                );
                if let Err(e) = armed {
                    warn!("Lights: {}", e);
                }
            }
        }
    }

    fn setup_tick(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            state.toggle_blue();
            state.setup_toggles += 1;
            if state.setup_toggles < SETUP_COMPLETE_TOGGLES {
                return;
            }
        }
        self.setup_timer.stop();

        // Requests made up to here are in `setup_next`; later ones wait for
        // the transition lock and see the new mode.
        let _transition = self.transition();
        let next = {
            let state = self.lock();
            if state.blue != BlueMode::SetupComplete {
                return;
            }
            state.setup_next
        };
        debug!("Lights: setup sequence complete, entering {:?}", next);
        self.enter_blue(next);
    }

    fn start_signals(self: &Arc<Self>, mode: YellowMode) {
        let start = {
            let mut state = self.lock();
            let was_off = state.yellow == YellowMode::Off;
            state.yellow = mode;
            state.apply_headlights();
            if was_off {
                state.yellow_on = false;
                state.toggle_signals();
            }
            was_off
        };
        if !start {
            return;
        }

        let weak = Arc::downgrade(self);
        let armed = self.signal_timer.set_interval(
            move || {
                if let Some(shared) = weak.upgrade() {
                    shared.lock().toggle_signals();
                }
            },
            self.intervals.turn_signal,
        );
        if let Err(e) = armed {
            warn!("Lights: {}", e);
        }
    }

    fn stop_signals(&self) {
        self.signal_timer.stop();
        let mut state = self.lock();
        state.yellow = YellowMode::Off;
        state.yellow_on = false;
        state.pins.write(Led::SignalLeft, false);
        state.pins.write(Led::SignalRight, false);
        state.apply_headlights();
    }
}

/// Drives the car's LEDs.
///
/// `turn_on_*` requests enter a mode that stays until the matching
/// `turn_off_*`. The setup-complete signal cannot be interrupted: blue mode
/// requests made while it plays are remembered and the last one is entered
/// when the sequence ends.
pub struct LedController<P: LedPins> {
    shared: Arc<Shared<P>>,
}

impl<P: LedPins> LedController<P> {
    /// Create a new controller with the default blink periods
    pub fn new(pins: P) -> Self {
        Self::with_intervals(pins, BlinkIntervals::default())
    }

    /// Create a new controller with custom blink periods
    pub fn with_intervals(pins: P, intervals: BlinkIntervals) -> Self {
        let state = LedState {
            pins,
            blue: BlueMode::Off,
            blue_on: false,
            setup_toggles: 0,
            setup_next: BlueMode::Off,
            yellow: YellowMode::Off,
            yellow_on: false,
            headlight: 0,
            full_beam: false,
            brake: 0,
            braking: false,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                blue_transition: Mutex::new(()),
                intervals,
                lateral_timer: Timer::new("led-lateral"),
                setup_timer: Timer::new("led-setup"),
                signal_timer: Timer::new("led-signal"),
            }),
        }
    }

    /// Blue LEDs solid
    pub fn turn_on_autonomous(&self) {
        self.shared.request_blue(BlueMode::Autonomous);
    }

    /// Blue LEDs blinking
    pub fn turn_on_lateral(&self) {
        self.shared.request_blue(BlueMode::Lateral);
    }

    /// Blue LEDs off
    pub fn turn_off_autonomous(&self) {
        self.shared.request_blue(BlueMode::Off);
    }

    /// Three quick blue blinks, then back to the previous or last requested mode
    pub fn signal_setup_complete(&self) {
        let _transition = self.shared.transition();
        if self.shared.lock().blue == BlueMode::SetupComplete {
            return;
        }
        self.shared.enter_blue(BlueMode::SetupComplete);
    }

    /// Whether the setup-complete sequence is still playing
    pub fn setup_signal_running(&self) -> bool {
        self.shared.lock().blue == BlueMode::SetupComplete
    }

    pub fn turn_on_daylight(&self) {
        let mut state = self.shared.lock();
        state.headlight = BRIGHTNESS_DAYLIGHT;
        state.brake = BRIGHTNESS_DAYLIGHT;
        state.apply_headlights();
        state.apply_brake();
    }

    pub fn turn_off_daylight(&self) {
        let mut state = self.shared.lock();
        state.headlight = 0;
        state.brake = 0;
        state.apply_headlights();
        state.apply_brake();
    }

    pub fn turn_on_full_beam(&self) {
        let mut state = self.shared.lock();
        state.full_beam = true;
        state.apply_headlights();
    }

    /// Headlights back to their daylight level
    pub fn turn_off_full_beam(&self) {
        let mut state = self.shared.lock();
        state.full_beam = false;
        state.apply_headlights();
    }

    pub fn turn_on_brake_light(&self) {
        let mut state = self.shared.lock();
        state.braking = true;
        state.apply_brake();
    }

    pub fn turn_off_brake_light(&self) {
        let mut state = self.shared.lock();
        state.braking = false;
        state.apply_brake();
    }

    /// Both turn signals blinking; headlights dark until turned off
    pub fn turn_on_hazard(&self) {
        self.shared.start_signals(YellowMode::Hazard);
    }

    pub fn turn_off_hazard(&self) {
        self.shared.stop_signals();
    }

    pub fn turn_on_signal_left(&self) {
        self.shared.start_signals(YellowMode::Left);
    }

    pub fn turn_on_signal_right(&self) {
        self.shared.start_signals(YellowMode::Right);
    }

    pub fn turn_off_turn_signal(&self) {
        self.shared.stop_signals();
    }

    /// Stop every pattern and switch all outputs off
    pub fn all_off(&self) {
        self.shared.lateral_timer.stop();
        self.shared.setup_timer.stop();
        self.shared.signal_timer.stop();

        let _transition = self.shared.transition();
        let mut state = self.shared.lock();
        state.blue = BlueMode::Off;
        state.setup_next = BlueMode::Off;
        state.yellow = YellowMode::Off;
        state.yellow_on = false;
        state.headlight = 0;
        state.full_beam = false;
        state.brake = 0;
        state.braking = false;
        state.set_blue(false);
        for led in [Led::SignalLeft, Led::SignalRight] {
            state.pins.write(led, false);
        }
        state.apply_headlights();
        state.apply_brake();
    }

    /// Run `f` with the pin backend
    pub fn with_pins<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.shared.lock().pins)
    }
}

impl<P: LedPins> std::fmt::Debug for LedController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("LedController")
            .field("blue", &state.blue)
            .field("yellow", &state.yellow)
            .field("headlight", &state.headlight)
            .finish()
    }
}

impl<P: LedPins> Drop for LedController<P> {
    fn drop(&mut self) {
        self.shared.lateral_timer.stop();
        self.shared.setup_timer.stop();
        self.shared.signal_timer.stop();
    }
}
