//! Daemon Wiring

use crate::config::VehicleConfig;
use anyhow::Context as _;
use companion_link::{
    publish_json, Channel, CompanionEvent, Publisher, ReceiverReport, StatusReport,
};
use lights::{LedController, LoggingPins};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use sumd_protocol::Receiver;
use timer::Timer;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use vehicle_fsm::Context;
use vehicle_link::{ChannelTransport, LinkError, SerialLink};
use vesc_protocol::{Telemetry, VescDecoder, VescDriver, VescMessage};

/// The state machine as the daemon runs it
pub type VehicleContext = Context<VescDriver<ChannelTransport>, LedController<LoggingPins>>;

/// Time the serial writers get to flush the final neutral commands
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run the vehicle until `shutdown` resolves or a serial link dies.
///
/// On the way out the timers stop, the car is brought to rest and the
/// lights go dark. A lost link is returned as an error.
pub async fn run<R1, R2, P, S>(
    config: &VehicleConfig,
    receiver_link: SerialLink<R1>,
    vesc_link: SerialLink<R2>,
    publisher: Arc<P>,
    mut companion_events: mpsc::Receiver<CompanionEvent>,
    shutdown: S,
) -> anyhow::Result<()>
where
    R1: AsyncRead + Unpin + Send + 'static,
    R2: AsyncRead + Unpin + Send + 'static,
    P: Publisher + ?Sized + 'static,
    S: Future<Output = ()>,
{
    let driver = VescDriver::new(vesc_link.transport(), config.calibration);
    let lights = LedController::new(LoggingPins::new());
    lights.turn_on_daylight();

    let ctx: Arc<Mutex<VehicleContext>> = Arc::new(Mutex::new(Context::new(
        driver.clone(),
        lights,
        config.calibration,
        config.link_timeouts(),
        Instant::now(),
    )));

    let mut receiver = Receiver::new(config.receiver.channels, config.calibration);
    {
        let ctx = Arc::clone(&ctx);
        let publisher = Arc::clone(&publisher);
        receiver.set_listener(move |packet| {
            lock(&ctx).handle_receiver_packet(packet, Instant::now());
            if let Err(e) = publish_json(&*publisher, Channel::Receiver, &ReceiverReport::from(&packet)) {
                debug!("Receiver report not published: {}", e);
            }
        });
    }

    let mut telemetry = Telemetry::new();
    {
        let publisher = Arc::clone(&publisher);
        telemetry.set_listener(move |data| {
            if let Err(e) = publish_json(&*publisher, Channel::Status, &StatusReport::from(data)) {
                debug!("Status report not published: {}", e);
            }
        });
    }

    let mut receiver_task = tokio::spawn(receiver_link.run_reader(move |bytes| {
        receiver.on_bytes(bytes);
    }));

    let mut decoder = VescDecoder::new();
    let mut vesc_task = tokio::spawn(vesc_link.run_reader(move |bytes| {
        for message in decoder.ingest(bytes) {
            match message {
                VescMessage::Values(data) => telemetry.update(data),
                VescMessage::Other { id, len } => {
                    debug!("VESC: ignoring packet id {} ({} bytes)", id, len)
                }
            }
        }
    }));

    let events_task = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            while let Some(event) = companion_events.recv().await {
                let now = Instant::now();
                let mut ctx = lock(&ctx);
                match event {
                    CompanionEvent::Drive(command) => ctx.handle_drive_command(command, now),
                    other => {
                        if let Some(connected) = other.connectivity() {
                            ctx.set_swiftrobot_connected(connected, now);
                        }
                    }
                }
            }
            debug!("Companion event stream closed");
        })
    };

    let poll_timer = Timer::new("vesc-poll");
    {
        let driver = driver.clone();
        poll_timer
            .set_interval(
                move || {
                    driver.request_state();
                },
                config.vesc.poll_interval(),
            )
            .context("starting the telemetry poll")?;
    }

    let watchdog = Timer::new("watchdog");
    {
        let ctx = Arc::clone(&ctx);
        watchdog
            .set_interval(
                move || lock(&ctx).check_timeouts(Instant::now()),
                config.watchdog.check_interval(),
            )
            .context("starting the link watchdog")?;
    }

    info!("Vehicle control running");

    tokio::pin!(shutdown);
    let result = tokio::select! {
        _ = &mut shutdown => {
            info!("Shutdown requested");
            Ok(())
        }
        exit = &mut receiver_task => link_exit("receiver", exit),
        exit = &mut vesc_task => link_exit("motor controller", exit),
    };

    watchdog.stop();
    poll_timer.stop();
    receiver_task.abort();
    vesc_task.abort();
    events_task.abort();

    // A listener already waiting on the lock still gets it after this; the
    // halted context drops its input.
    lock(&ctx).shutdown();

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!("Vehicle control stopped");
    result
}

fn link_exit(link: &str, exit: Result<Result<(), LinkError>, JoinError>) -> anyhow::Result<()> {
    match exit {
        Ok(Ok(())) => {
            warn!("{} link reader stopped", link);
            Err(anyhow::anyhow!("{} link reader stopped", link))
        }
        Ok(Err(e)) => {
            error!("{} link lost: {}", link, e);
            Err(e).with_context(|| format!("{} link lost", link))
        }
        Err(e) => Err(e).with_context(|| format!("{} link reader panicked", link)),
    }
}
