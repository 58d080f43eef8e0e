//! State Machine Context

use crate::monitor::LinkMonitor;
use crate::outputs::{LightOutput, MotorOutput};
use crate::state::VehicleState;
use crate::MOTOR_RESET_THRESHOLD;
use companion_link::DriveCommand;
use metrics::counter;
use std::time::{Duration, Instant};
use sumd_protocol::ReceiverPacket;
use tracing::{debug, info, warn};
use vehicle_link::Calibration;
use vesc_protocol::SendOutcome;

/// Silence after which each link counts as lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    pub receiver: Duration,
    pub companion: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            receiver: Duration::from_millis(50),
            companion: Duration::from_millis(50),
        }
    }
}

/// The state machine and everything its states act on.
///
/// Events are plain method calls. Each is interpreted by the current state;
/// events a state does not care about are ignored, as are requests for the
/// state that is already active.
pub struct Context<M, L> {
    state: VehicleState,
    /// State to resume when the receiver comes back; only set in FailSafe
    history: Option<VehicleState>,
    swiftrobot_connected: bool,
    motor: M,
    lights: L,
    calibration: Calibration,
    receiver_link: LinkMonitor,
    companion_link: LinkMonitor,
    last_packet: Option<ReceiverPacket>,
    last_drive: Option<DriveCommand>,
    /// Set by `shutdown`; inputs are ignored from then on
    halted: bool,
}

impl<M: MotorOutput, L: LightOutput> Context<M, L> {
    /// Create a context in `Setup`; link silence is measured from `now`
    pub fn new(
        motor: M,
        lights: L,
        calibration: Calibration,
        timeouts: LinkTimeouts,
        now: Instant,
    ) -> Self {
        info!("Vehicle state: {}", VehicleState::Setup);
        Self {
            state: VehicleState::Setup,
            history: None,
            swiftrobot_connected: false,
            motor,
            lights,
            calibration,
            receiver_link: LinkMonitor::new("Receiver", timeouts.receiver, now),
            companion_link: LinkMonitor::new("Companion", timeouts.companion, now),
            last_packet: None,
            last_drive: None,
            halted: false,
        }
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn history(&self) -> Option<VehicleState> {
        self.history
    }

    pub fn swiftrobot_connected(&self) -> bool {
        self.swiftrobot_connected
    }

    pub fn last_packet(&self) -> Option<&ReceiverPacket> {
        self.last_packet.as_ref()
    }

    /// Whether `shutdown` has run
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn last_drive(&self) -> Option<&DriveCommand> {
        self.last_drive.as_ref()
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn lights(&self) -> &L {
        &self.lights
    }

    // ------------------------------------------------------------------
    // Transition protocol
    // ------------------------------------------------------------------

    /// Leave the current state and enter `next`
    pub fn transition_to(&mut self, next: VehicleState) {
        let prev = self.state;
        self.exit(prev, next);
        self.history = (next == VehicleState::FailSafe).then_some(prev);
        self.state = next;
        info!("Vehicle state: {} -> {}", prev, next);
        counter!("fsm_transitions", "to" => next.name()).increment(1);
        self.entry(next);
    }

    /// Resume the state that was active before FailSafe
    pub fn transition_to_history(&mut self) {
        let Some(target) = self.history.take() else {
            warn!("Vehicle state: no history to resume, staying in {}", self.state);
            counter!("fsm_history_underflow").increment(1);
            return;
        };
        let prev = self.state;
        self.exit(prev, target);
        self.state = target;
        info!("Vehicle state: {} -> {} (resumed)", prev, target);
        counter!("fsm_transitions", "to" => target.name()).increment(1);
        self.entry(target);
    }

    fn request(&mut self, next: VehicleState) {
        if next != self.state {
            self.transition_to(next);
        }
    }

    fn entry(&mut self, state: VehicleState) {
        match state {
            VehicleState::Setup | VehicleState::ManualControl => {}
            VehicleState::ManualWaiting => {
                self.motor_neutral();
                self.lights.autonomous_off();
            }
            VehicleState::LateralControl => self.lights.lateral_on(),
            VehicleState::Autonomous => self.lights.autonomous_on(),
            VehicleState::FailSafe => {
                self.motor_neutral();
                self.lights.hazard_on();
            }
        }
    }

    fn exit(&mut self, state: VehicleState, next: VehicleState) {
        match state {
            // Losing the receiver during boot is not a completed setup
            VehicleState::Setup if next != VehicleState::FailSafe => {
                self.lights.setup_complete_signal();
            }
            VehicleState::FailSafe => self.lights.hazard_off(),
            _ => {}
        }
    }

    fn motor_neutral(&mut self) {
        log_outcome("neutral servo", self.motor.set_raw_servo(self.calibration.failsafe_steering));
        log_outcome("neutral duty", self.motor.set_raw_duty(self.calibration.failsafe_duty_cycle));
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Receiver switch in manual position
    pub fn manual_control(&mut self) {
        match self.state {
            VehicleState::Setup | VehicleState::LateralControl | VehicleState::Autonomous => {
                self.transition_to(VehicleState::ManualWaiting)
            }
            VehicleState::ManualWaiting | VehicleState::ManualControl | VehicleState::FailSafe => {}
        }
    }

    /// Receiver switch in autonomous position
    pub fn autonomous_control(&mut self) {
        if !self.swiftrobot_connected {
            return;
        }
        match self.state {
            VehicleState::FailSafe => {}
            _ => self.request(VehicleState::Autonomous),
        }
    }

    /// Receiver switch in lateral position
    pub fn lateral_control(&mut self) {
        if !self.swiftrobot_connected {
            return;
        }
        match self.state {
            VehicleState::FailSafe => {}
            _ => self.request(VehicleState::LateralControl),
        }
    }

    pub fn receiver_timed_out(&mut self) {
        self.request(VehicleState::FailSafe);
    }

    pub fn receiver_connected(&mut self) {
        if self.state == VehicleState::FailSafe {
            self.transition_to_history();
        }
    }

    /// Throttle stick released
    pub fn receiver_motor_reset(&mut self) {
        if self.state == VehicleState::ManualWaiting {
            self.transition_to(VehicleState::ManualControl);
        }
    }

    pub fn swiftrobot_timed_out(&mut self) {
        if self.state == VehicleState::Autonomous {
            self.transition_to(VehicleState::ManualWaiting);
        }
    }

    /// New receiver values for the states that drive from them
    pub fn receiver_packet_updated(&mut self, packet: &ReceiverPacket) {
        match self.state {
            VehicleState::ManualControl => {
                log_outcome("servo", self.motor.set_raw_servo(packet.steering));
                log_outcome("duty", self.motor.set_raw_duty(packet.signed_throttle()));
            }
            VehicleState::LateralControl => {
                log_outcome("duty", self.motor.set_raw_duty(packet.signed_throttle()));
            }
            _ => {}
        }
    }

    /// New companion command for the states that drive from it
    pub fn drive_msg_updated(&mut self, command: &DriveCommand) {
        match self.state {
            VehicleState::LateralControl => {
                log_outcome("servo", self.motor.set_servo_pos(command.steer));
            }
            VehicleState::Autonomous => {
                log_outcome("servo", self.motor.set_servo_pos(command.steer));
                log_outcome(
                    "duty",
                    self.motor.set_duty_cycle(command.throttle, command.reverse),
                );
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Process one receiver packet arriving at `now`.
    ///
    /// Order: liveness, packet delivery, reconnect, mode switch request,
    /// then the throttle release check.
    pub fn handle_receiver_packet(&mut self, packet: ReceiverPacket, now: Instant) {
        if self.halted {
            return;
        }
        self.receiver_link.touch(now);
        self.last_packet = Some(packet);

        self.receiver_packet_updated(&packet);
        self.receiver_connected();

        if packet.lateral_control {
            if packet.autonomous {
                self.autonomous_control();
            } else {
                self.lateral_control();
            }
        } else {
            self.manual_control();
        }

        if packet.throttle <= MOTOR_RESET_THRESHOLD {
            self.receiver_motor_reset();
        }
    }

    /// Process one companion drive command arriving at `now`
    pub fn handle_drive_command(&mut self, command: DriveCommand, now: Instant) {
        if self.halted {
            return;
        }
        self.companion_link.touch(now);
        if !self.swiftrobot_connected {
            debug!("Companion drive traffic, marking connected");
            self.swiftrobot_connected = true;
        }
        self.last_drive = Some(command);
        self.drive_msg_updated(&command);
    }

    /// Companion connectivity reported by the messaging layer
    pub fn set_swiftrobot_connected(&mut self, connected: bool, now: Instant) {
        if self.halted {
            return;
        }
        if connected != self.swiftrobot_connected {
            info!(
                "Companion {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
        self.swiftrobot_connected = connected;
        if connected {
            self.companion_link.touch(now);
        }
    }

    /// Watchdog tick.
    ///
    /// A silent receiver forces FailSafe on every check. A silent companion
    /// is reported once per outage: the connectivity flag drops and the
    /// current state is told.
    pub fn check_timeouts(&mut self, now: Instant) {
        if self.halted {
            return;
        }
        self.receiver_link.poll(now);
        if self.receiver_link.is_stale(now) {
            self.receiver_timed_out();
        }

        if self.companion_link.poll(now) {
            self.swiftrobot_connected = false;
            self.swiftrobot_timed_out();
        }
    }

    /// Bring the car to rest and switch the lights off.
    ///
    /// Terminal: the neutral command sent here is the last motor output,
    /// every later input is dropped.
    pub fn shutdown(&mut self) {
        if self.halted {
            return;
        }
        self.halted = true;
        info!("Vehicle shutting down in {}", self.state);
        self.motor_neutral();
        self.lights.all_off();
    }
}

fn log_outcome(what: &str, outcome: SendOutcome) {
    if outcome != SendOutcome::Sent {
        debug!("Vehicle: {} command {:?}", what, outcome);
    }
}

impl<M, L> std::fmt::Debug for Context<M, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("history", &self.history)
            .field("swiftrobot_connected", &self.swiftrobot_connected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};
    use sumd_protocol::Gear;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        ServoPos(f32),
        RawServo(f32),
        Duty(f32, bool),
        RawDuty(f32),
        Light(&'static str),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    struct MockMotor(Log);

    impl MotorOutput for MockMotor {
        fn set_servo_pos(&self, pos: f32) -> SendOutcome {
            self.0.lock().unwrap().push(Call::ServoPos(pos));
            SendOutcome::Sent
        }

        fn set_raw_servo(&self, servo: f32) -> SendOutcome {
            self.0.lock().unwrap().push(Call::RawServo(servo));
            SendOutcome::Sent
        }

        fn set_duty_cycle(&self, requested: f32, reverse: bool) -> SendOutcome {
            self.0.lock().unwrap().push(Call::Duty(requested, reverse));
            SendOutcome::Sent
        }

        fn set_raw_duty(&self, duty: f32) -> SendOutcome {
            self.0.lock().unwrap().push(Call::RawDuty(duty));
            SendOutcome::Sent
        }
    }

    struct MockLights(Log);

    impl MockLights {
        fn push(&self, name: &'static str) {
            self.0.lock().unwrap().push(Call::Light(name));
        }
    }

    impl LightOutput for MockLights {
        fn autonomous_on(&self) {
            self.push("autonomous_on");
        }
        fn autonomous_off(&self) {
            self.push("autonomous_off");
        }
        fn lateral_on(&self) {
            self.push("lateral_on");
        }
        fn setup_complete_signal(&self) {
            self.push("setup_complete");
        }
        fn hazard_on(&self) {
            self.push("hazard_on");
        }
        fn hazard_off(&self) {
            self.push("hazard_off");
        }
        fn daylight_on(&self) {
            self.push("daylight_on");
        }
        fn all_off(&self) {
            self.push("all_off");
        }
    }

    struct Harness {
        ctx: Context<MockMotor, MockLights>,
        log: Log,
        start: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let log: Log = Arc::default();
            let start = Instant::now();
            let ctx = Context::new(
                MockMotor(log.clone()),
                MockLights(log.clone()),
                Calibration::default(),
                LinkTimeouts::default(),
                start,
            );
            Self { ctx, log, start }
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn take_log(&self) -> Vec<Call> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }

        /// Drive the machine into `state` through its public events
        fn reach(&mut self, state: VehicleState) {
            self.ctx.set_swiftrobot_connected(true, self.start);
            match state {
                VehicleState::Setup => {}
                VehicleState::ManualWaiting => self.ctx.manual_control(),
                VehicleState::ManualControl => {
                    self.ctx.manual_control();
                    self.ctx.receiver_motor_reset();
                }
                VehicleState::LateralControl => self.ctx.lateral_control(),
                VehicleState::Autonomous => self.ctx.autonomous_control(),
                VehicleState::FailSafe => self.ctx.receiver_timed_out(),
            }
            assert_eq!(self.ctx.state(), state);
            self.take_log();
        }
    }

    fn packet(throttle: f32, lateral: bool, autonomous: bool) -> ReceiverPacket {
        ReceiverPacket {
            throttle,
            steering: 0.55,
            gear: Gear::Drive,
            lateral_control: lateral,
            autonomous,
        }
    }

    fn neutral() -> [Call; 2] {
        [Call::RawServo(0.6), Call::RawDuty(0.0)]
    }

    #[test]
    fn test_starts_in_setup() {
        let h = Harness::new();
        assert_eq!(h.ctx.state(), VehicleState::Setup);
        assert_eq!(h.ctx.history(), None);
        assert!(!h.ctx.swiftrobot_connected());
        assert!(h.take_log().is_empty());
    }

    #[test]
    fn test_setup_to_manual_waiting_signals_and_neutralizes() {
        let mut h = Harness::new();
        h.ctx.manual_control();

        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);
        let mut expected = vec![Call::Light("setup_complete")];
        expected.extend(neutral());
        expected.push(Call::Light("autonomous_off"));
        assert_eq!(h.take_log(), expected);
    }

    #[test]
    fn test_manual_waiting_reset_then_packet_drives() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualWaiting);

        // Throttle held: packets are ignored and the gate stays shut
        h.ctx.handle_receiver_packet(packet(0.15, false, false), h.at(1));
        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);
        assert!(h.take_log().is_empty());

        // Released throttle opens the gate
        h.ctx.handle_receiver_packet(packet(0.0, false, false), h.at(2));
        assert_eq!(h.ctx.state(), VehicleState::ManualControl);

        h.ctx.handle_receiver_packet(packet(0.12, false, false), h.at(3));
        assert_eq!(
            h.take_log(),
            vec![Call::RawServo(0.55), Call::RawDuty(0.12)]
        );
    }

    #[test]
    fn test_manual_control_reverse_gear_negates_duty() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualControl);

        let mut p = packet(0.1, false, false);
        p.gear = Gear::Reverse;
        h.ctx.receiver_packet_updated(&p);

        assert_eq!(h.take_log(), vec![Call::RawServo(0.55), Call::RawDuty(-0.1)]);
    }

    #[test]
    fn test_receiver_timeout_from_every_state() {
        for state in VehicleState::ALL {
            let mut h = Harness::new();
            h.reach(state);

            h.ctx.check_timeouts(h.at(51));

            assert_eq!(h.ctx.state(), VehicleState::FailSafe, "from {}", state);
            if state == VehicleState::FailSafe {
                assert!(h.take_log().is_empty());
                continue;
            }
            let log = h.take_log();
            assert_eq!(h.ctx.history(), Some(state));
            // Motor neutral precedes every other output of the FailSafe entry
            let first_motor = log.iter().position(|c| *c == Call::RawServo(0.6)).unwrap();
            assert_eq!(&log[first_motor..first_motor + 2], &neutral());
            assert_eq!(log.last(), Some(&Call::Light("hazard_on")));
        }
    }

    #[test]
    fn test_no_timeout_while_receiver_alive() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualWaiting);

        h.ctx.handle_receiver_packet(packet(0.1, false, false), h.at(40));
        h.ctx.check_timeouts(h.at(80));

        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);
    }

    #[test]
    fn test_history_resumes_setup() {
        let mut h = Harness::new();

        h.ctx.check_timeouts(h.at(60));
        assert_eq!(h.ctx.state(), VehicleState::FailSafe);
        assert_eq!(h.ctx.history(), Some(VehicleState::Setup));
        // No setup-complete signal when boot is interrupted
        assert!(!h.take_log().contains(&Call::Light("setup_complete")));

        h.ctx.receiver_connected();
        assert_eq!(h.ctx.state(), VehicleState::Setup);
        assert_eq!(h.ctx.history(), None);
        assert_eq!(h.take_log(), vec![Call::Light("hazard_off")]);
    }

    #[test]
    fn test_history_resume_reruns_entry() {
        let mut h = Harness::new();
        h.reach(VehicleState::LateralControl);
        h.ctx.receiver_timed_out();
        h.take_log();

        h.ctx.receiver_connected();

        assert_eq!(h.ctx.state(), VehicleState::LateralControl);
        assert_eq!(
            h.take_log(),
            vec![Call::Light("hazard_off"), Call::Light("lateral_on")]
        );
    }

    #[test]
    fn test_packet_after_failsafe_resumes_then_requests_mode() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualControl);
        h.ctx.check_timeouts(h.at(100));
        h.take_log();

        h.ctx.handle_receiver_packet(packet(0.1, false, false), h.at(101));

        // FailSafe ignores the packet itself; reconnect resumes ManualControl
        assert_eq!(h.ctx.state(), VehicleState::ManualControl);
        assert_eq!(h.take_log(), vec![Call::Light("hazard_off")]);
    }

    #[test]
    fn test_history_underflow_stays_in_failsafe() {
        let mut h = Harness::new();
        h.reach(VehicleState::FailSafe);
        h.ctx.history = None;

        h.ctx.receiver_connected();

        assert_eq!(h.ctx.state(), VehicleState::FailSafe);
        assert!(h.take_log().is_empty());
    }

    #[test]
    fn test_repeated_timeouts_collapse() {
        let mut h = Harness::new();
        h.reach(VehicleState::Autonomous);

        h.ctx.receiver_timed_out();
        h.ctx.receiver_timed_out();
        h.ctx.check_timeouts(h.at(500));

        assert_eq!(h.ctx.history(), Some(VehicleState::Autonomous));
        h.ctx.receiver_connected();
        assert_eq!(h.ctx.state(), VehicleState::Autonomous);
    }

    #[test]
    fn test_autonomy_requires_companion() {
        for state in [
            VehicleState::Setup,
            VehicleState::ManualWaiting,
            VehicleState::ManualControl,
        ] {
            let mut h = Harness::new();
            h.reach(state);
            h.ctx.set_swiftrobot_connected(false, h.start);

            h.ctx.autonomous_control();
            h.ctx.lateral_control();
            assert_eq!(h.ctx.state(), state);

            h.ctx.set_swiftrobot_connected(true, h.start);
            h.ctx.lateral_control();
            assert_eq!(h.ctx.state(), VehicleState::LateralControl);
            h.ctx.autonomous_control();
            assert_eq!(h.ctx.state(), VehicleState::Autonomous);
        }
    }

    #[test]
    fn test_failsafe_ignores_mode_requests() {
        let mut h = Harness::new();
        h.reach(VehicleState::FailSafe);

        h.ctx.manual_control();
        h.ctx.autonomous_control();
        h.ctx.lateral_control();
        h.ctx.receiver_motor_reset();
        h.ctx.swiftrobot_timed_out();

        assert_eq!(h.ctx.state(), VehicleState::FailSafe);
        assert!(h.take_log().is_empty());
    }

    #[test]
    fn test_manual_request_in_manual_waiting_is_noop() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualWaiting);

        h.ctx.manual_control();
        assert!(h.take_log().is_empty());
    }

    #[test]
    fn test_lateral_split_authority() {
        let mut h = Harness::new();
        h.reach(VehicleState::LateralControl);

        h.ctx.receiver_packet_updated(&packet(0.08, true, false));
        h.ctx.drive_msg_updated(&DriveCommand {
            steer: 0.3,
            throttle: 0.9,
            reverse: false,
        });

        assert_eq!(
            h.take_log(),
            vec![Call::RawDuty(0.08), Call::ServoPos(0.3)]
        );
    }

    #[test]
    fn test_autonomous_drives_from_companion() {
        let mut h = Harness::new();
        h.reach(VehicleState::Autonomous);

        h.ctx.receiver_packet_updated(&packet(0.2, true, true));
        h.ctx.handle_drive_command(
            DriveCommand {
                steer: 0.7,
                throttle: 0.4,
                reverse: true,
            },
            h.at(5),
        );

        assert_eq!(
            h.take_log(),
            vec![Call::ServoPos(0.7), Call::Duty(0.4, true)]
        );
        assert_eq!(h.ctx.last_drive().map(|d| d.steer), Some(0.7));
    }

    #[test]
    fn test_companion_timeout_leaves_autonomous_once() {
        let mut h = Harness::new();
        h.reach(VehicleState::Autonomous);
        h.ctx.handle_receiver_packet(packet(0.1, true, true), h.at(60));

        h.ctx.check_timeouts(h.at(61));
        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);
        assert!(!h.ctx.swiftrobot_connected());

        // Switch still in autonomous: no way back until the companion returns
        h.ctx.handle_receiver_packet(packet(0.1, true, true), h.at(70));
        h.ctx.check_timeouts(h.at(71));
        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);

        h.ctx.handle_drive_command(DriveCommand::default(), h.at(72));
        h.ctx.handle_receiver_packet(packet(0.1, true, true), h.at(73));
        assert_eq!(h.ctx.state(), VehicleState::Autonomous);
    }

    #[test]
    fn test_receiver_switch_positions() {
        let mut h = Harness::new();
        h.ctx.set_swiftrobot_connected(true, h.at(0));

        h.ctx.handle_receiver_packet(packet(0.1, true, false), h.at(1));
        assert_eq!(h.ctx.state(), VehicleState::LateralControl);

        h.ctx.handle_receiver_packet(packet(0.1, true, true), h.at(2));
        assert_eq!(h.ctx.state(), VehicleState::Autonomous);

        h.ctx.handle_receiver_packet(packet(0.1, false, false), h.at(3));
        assert_eq!(h.ctx.state(), VehicleState::ManualWaiting);

        h.ctx.handle_receiver_packet(packet(0.004, false, false), h.at(4));
        assert_eq!(h.ctx.state(), VehicleState::ManualControl);
    }

    #[test]
    fn test_shutdown_neutralizes_and_darkens() {
        let mut h = Harness::new();
        h.reach(VehicleState::ManualControl);

        h.ctx.shutdown();

        let mut expected = neutral().to_vec();
        expected.push(Call::Light("all_off"));
        assert_eq!(h.take_log(), expected);
    }

    #[test]
    fn test_inputs_after_shutdown_are_dropped() {
        let mut h = Harness::new();
        h.reach(VehicleState::Autonomous);
        h.ctx.shutdown();
        assert!(h.ctx.is_halted());
        h.take_log();

        h.ctx.handle_receiver_packet(packet(0.12, false, false), h.at(1));
        h.ctx.handle_drive_command(
            DriveCommand {
                steer: 0.2,
                throttle: 0.8,
                reverse: false,
            },
            h.at(2),
        );
        h.ctx.set_swiftrobot_connected(false, h.at(3));
        h.ctx.check_timeouts(h.at(1_000));
        h.ctx.shutdown();

        assert!(h.take_log().is_empty());
        assert_eq!(h.ctx.state(), VehicleState::Autonomous);
    }

    #[derive(Debug, Clone)]
    enum Event {
        Manual,
        Autonomous,
        Lateral,
        TimedOut,
        Connected,
        MotorReset,
        CompanionTimedOut,
        Companion(bool),
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Manual),
            Just(Event::Autonomous),
            Just(Event::Lateral),
            Just(Event::TimedOut),
            Just(Event::Connected),
            Just(Event::MotorReset),
            Just(Event::CompanionTimedOut),
            any::<bool>().prop_map(Event::Companion),
        ]
    }

    proptest! {
        #[test]
        fn prop_history_only_in_failsafe(events in proptest::collection::vec(event(), 0..60)) {
            let mut h = Harness::new();
            for event in events {
                let before = h.ctx.state();
                match event {
                    Event::Manual => h.ctx.manual_control(),
                    Event::Autonomous => h.ctx.autonomous_control(),
                    Event::Lateral => h.ctx.lateral_control(),
                    Event::TimedOut => h.ctx.receiver_timed_out(),
                    Event::Connected => h.ctx.receiver_connected(),
                    Event::MotorReset => h.ctx.receiver_motor_reset(),
                    Event::CompanionTimedOut => h.ctx.swiftrobot_timed_out(),
                    Event::Companion(up) => h.ctx.set_swiftrobot_connected(up, h.start),
                }

                let state = h.ctx.state();
                prop_assert_eq!(h.ctx.history().is_some(), state == VehicleState::FailSafe);
                prop_assert_ne!(h.ctx.history(), Some(VehicleState::FailSafe));
                if matches!(event, Event::TimedOut) {
                    prop_assert_eq!(state, VehicleState::FailSafe);
                }
                if before == VehicleState::FailSafe && matches!(event, Event::Connected) {
                    prop_assert_ne!(state, VehicleState::FailSafe);
                }
                if state.is_assisted() && state != before {
                    prop_assert!(h.ctx.swiftrobot_connected());
                }
            }
        }
    }
}
