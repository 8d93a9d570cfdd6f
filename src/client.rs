use crate::connection::{self, LineReader, LineWriter};
use crate::error::{AvrError, Result};
use crate::protocol::{
    self, Command, Event, Step, BIAS_MAX, BIAS_MIN, DEFAULT_PORT, INIT_QUERIES,
};
use crate::state::{DeviceState, Field, Value};
use crate::subscription::{Observers, StateReceiver, StateUpdate};
use crate::types::{
    Channel, EcoMode, InputSource, PictureMode, PowerState, SoundMode, Zone, ZonePower,
    ZoneSource,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for [`AvrClient::connect_with`]
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Telnet port, 23 on every known model
    pub port: u16,
    /// Upper bound for establishing the TCP connection
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Initializing,
    Ready,
    Closed,
}

/// Session state shared between the handle and its background tasks
struct Shared {
    state: Mutex<DeviceState>,
    phase: Mutex<Phase>,
    observers: Observers,
    updates: broadcast::Sender<StateUpdate>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Decode one line, apply it and notify about what changed
    fn handle_line(&self, line: &str) {
        let event = protocol::decode(line);
        if event == Event::Ignored {
            tracing::debug!("Ignored: {}", line);
            return;
        }

        let changes = self.state().apply(&event);
        for (field, value) in changes {
            self.observers.notify(field, &value);
            let _ = self.updates.send(StateUpdate::Changed(field, value));
        }
    }

    /// Enter `Closed` once. Returns false if already closed.
    fn close(&self) -> bool {
        {
            let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
            if *phase == Phase::Closed {
                return false;
            }
            *phase = Phase::Closed;
        }
        self.observers.clear();
        let _ = self.updates.send(StateUpdate::Disconnected);
        true
    }
}

/// Control session with a Marantz/Denon receiver
///
/// Commands are queued and written in the background; none of them waits
/// for the device. The device echoes state changes asynchronously and those
/// echoes are the only confirmation a command ever gets. Observe them with
/// [`subscribe`](Self::subscribe) or [`updates`](Self::updates).
///
/// Dropping the client closes the session.
pub struct AvrClient {
    name: String,
    host: String,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl AvrClient {
    /// Connect to a receiver on the default port with the default timeout
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mdavr::AvrClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let avr = AvrClient::connect("Living Room", "192.168.1.50").await?;
    ///     avr.turn_on()?;
    ///     avr.set_volume(45.5)?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(name: impl Into<String>, host: impl Into<String>) -> Result<Self> {
        Self::connect_with(name, host, ConnectOptions::default()).await
    }

    /// Connect with explicit port and timeout
    pub async fn connect_with(
        name: impl Into<String>,
        host: impl Into<String>,
        options: ConnectOptions,
    ) -> Result<Self> {
        let host = host.into();
        let (reader, writer) = connection::connect(&host, options.port, options.timeout).await?;
        Ok(Self::start(name.into(), host, reader, writer))
    }

    /// Run a session over an established transport
    pub fn from_transport<R, W>(
        name: impl Into<String>,
        host: impl Into<String>,
        reader: LineReader<R>,
        writer: LineWriter<W>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(name.into(), host.into(), reader, writer)
    }

    fn start<R, W>(name: String, host: String, reader: LineReader<R>, writer: LineWriter<W>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (updates, _) = broadcast::channel(256);
        let shared = Arc::new(Shared {
            state: Mutex::new(DeviceState::default()),
            phase: Mutex::new(Phase::Connecting),
            observers: Observers::default(),
            updates,
        });
        let cancel = CancellationToken::new();
        let (commands, command_rx) = mpsc::unbounded_channel::<String>();

        shared.set_phase(Phase::Initializing);
        tokio::spawn(write_loop(writer, command_rx, cancel.clone()));
        tokio::spawn(read_loop(reader, shared.clone(), cancel.clone(), name.clone()));

        let client = Self {
            name,
            host,
            shared,
            commands,
            cancel,
        };
        client.queue_queries();
        client.shared.set_phase(Phase::Ready);
        tracing::info!("Session with {} ({}) ready", client.name, client.host);
        client
    }

    /// Friendly name given at connect time
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the session is connected to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Whether the session still accepts commands
    pub fn is_alive(&self) -> bool {
        self.phase() != Phase::Closed
    }

    /// Snapshot of everything known about the device
    pub fn status(&self) -> DeviceState {
        self.shared.state().clone()
    }

    /// Current value of a single attribute
    pub fn get(&self, field: Field) -> Value {
        self.shared.state().get(field)
    }

    // ========== Subscriptions ==========

    /// Register a callback for every attribute change
    ///
    /// Callbacks run inside the receive loop in wire order, so they should
    /// return quickly. A panicking callback is logged and skipped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mdavr::AvrClient;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let avr = AvrClient::connect("Living Room", "192.168.1.50").await?;
    /// avr.subscribe(|field, value| println!("{} is now {}", field, value));
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(Field, &Value) + Send + Sync + 'static,
    {
        self.shared.observers.add(Arc::new(callback));
    }

    /// Receive changes through a channel instead of a callback
    pub fn updates(&self) -> StateReceiver {
        StateReceiver::new(self.shared.updates.subscribe())
    }

    // ========== Attributes ==========

    pub fn power(&self) -> Option<PowerState> {
        self.shared.state().power
    }

    pub fn zone_power(&self, zone: Zone) -> Option<ZonePower> {
        let state = self.shared.state();
        match zone {
            Zone::Main => state.main_power,
            Zone::Zone2 => state.z2_power,
            Zone::Zone3 => state.z3_power,
        }
    }

    pub fn muted(&self) -> Option<bool> {
        self.zone_muted(Zone::Main)
    }

    pub fn zone_muted(&self, zone: Zone) -> Option<bool> {
        let state = self.shared.state();
        match zone {
            Zone::Main => state.muted,
            Zone::Zone2 => state.z2_muted,
            Zone::Zone3 => state.z3_muted,
        }
    }

    pub fn volume(&self) -> Option<f64> {
        self.zone_volume(Zone::Main)
    }

    pub fn zone_volume(&self, zone: Zone) -> Option<f64> {
        let state = self.shared.state();
        match zone {
            Zone::Main => state.volume,
            Zone::Zone2 => state.z2_volume,
            Zone::Zone3 => state.z3_volume,
        }
    }

    /// Volume ceiling reported by the device, unknown until it says so
    pub fn max_volume(&self) -> Option<f64> {
        self.shared.state().max_volume
    }

    pub fn source(&self) -> Option<InputSource> {
        self.shared.state().source
    }

    pub fn zone_source(&self, zone: Zone) -> Option<ZoneSource> {
        let state = self.shared.state();
        match zone {
            Zone::Main => state.source.map(ZoneSource::Input),
            Zone::Zone2 => state.z2_source,
            Zone::Zone3 => state.z3_source,
        }
    }

    pub fn source_list(&self) -> BTreeSet<InputSource> {
        self.shared.state().source_list()
    }

    pub fn sound_mode(&self) -> Option<String> {
        self.shared.state().sound_mode.clone()
    }

    pub fn sound_mode_list(&self) -> &'static [SoundMode] {
        SoundMode::ALL
    }

    pub fn picture_mode(&self) -> Option<PictureMode> {
        self.shared.state().picture_mode
    }

    pub fn picture_mode_list(&self) -> &'static [PictureMode] {
        PictureMode::ALL
    }

    pub fn eco_mode(&self) -> Option<EcoMode> {
        self.shared.state().eco_mode
    }

    pub fn eco_mode_list(&self) -> &'static [EcoMode] {
        EcoMode::ALL
    }

    pub fn channels_bias(&self) -> BTreeMap<Channel, f64> {
        self.shared.state().channels_bias.value().clone()
    }

    /// Channels the current sound mode exposes
    pub fn channels_bias_list(&self) -> BTreeSet<Channel> {
        self.shared.state().channels_bias_list()
    }

    pub fn sampling_rate(&self) -> Option<f64> {
        self.shared.state().sampling_rate
    }

    // ========== Power ==========

    pub fn turn_on(&self) -> Result<()> {
        self.send(Command::Power(PowerState::On))
    }

    pub fn turn_off(&self) -> Result<()> {
        self.send(Command::Power(PowerState::Standby))
    }

    pub fn zone_turn_on(&self, zone: Zone) -> Result<()> {
        self.send(Command::ZonePower(zone, ZonePower::On))
    }

    pub fn zone_turn_off(&self, zone: Zone) -> Result<()> {
        self.send(Command::ZonePower(zone, ZonePower::Off))
    }

    // ========== Mute ==========

    pub fn mute_volume(&self, mute: bool) -> Result<()> {
        self.zone_mute_volume(Zone::Main, mute)
    }

    pub fn zone_mute_volume(&self, zone: Zone, mute: bool) -> Result<()> {
        self.send(Command::Mute(zone, mute))
    }

    // ========== Volume ==========

    /// Set the main zone volume, rounded to the nearest 0.5 dB
    ///
    /// Fails with `InvalidArgument` outside `0..=max_volume`.
    pub fn set_volume(&self, level: f64) -> Result<()> {
        self.zone_set_volume(Zone::Main, level)
    }

    pub fn volume_up(&self) -> Result<()> {
        self.zone_volume_up(Zone::Main)
    }

    pub fn volume_down(&self) -> Result<()> {
        self.zone_volume_down(Zone::Main)
    }

    /// Set a zone volume; secondary zones use whole dB steps
    pub fn zone_set_volume(&self, zone: Zone, level: f64) -> Result<()> {
        self.send(Command::Volume(zone, level))
    }

    pub fn zone_volume_up(&self, zone: Zone) -> Result<()> {
        self.send(Command::VolumeStep(zone, Step::Up))
    }

    pub fn zone_volume_down(&self, zone: Zone) -> Result<()> {
        self.send(Command::VolumeStep(zone, Step::Down))
    }

    // ========== Sources and modes ==========

    /// Select the main zone input by name, e.g. `"Media Player"` or `"CD"`
    pub fn select_source(&self, source: &str) -> Result<()> {
        self.zone_select_source(Zone::Main, source)
    }

    pub fn zone_select_source(&self, zone: Zone, source: &str) -> Result<()> {
        self.ensure_open()?;
        self.send(Command::Source(zone, source.parse()?))
    }

    pub fn select_sound_mode(&self, mode: &str) -> Result<()> {
        self.ensure_open()?;
        self.send(Command::SoundMode(mode.parse()?))
    }

    pub fn select_picture_mode(&self, mode: &str) -> Result<()> {
        self.ensure_open()?;
        self.send(Command::PictureMode(mode.parse()?))
    }

    pub fn select_eco_mode(&self, mode: &str) -> Result<()> {
        self.ensure_open()?;
        self.send(Command::EcoMode(mode.parse()?))
    }

    // ========== Channel bias ==========

    /// Set the bias of a channel, clamped to ±12 dB in 0.5 dB steps
    ///
    /// The channel must be part of the current bias report.
    pub fn set_channel_bias(&self, channel: &str, level: f64) -> Result<()> {
        self.ensure_open()?;
        self.send(Command::ChannelBias(channel.parse()?, level))
    }

    pub fn channel_bias_up(&self, channel: &str) -> Result<()> {
        self.bias_step(channel, Step::Up)
    }

    pub fn channel_bias_down(&self, channel: &str) -> Result<()> {
        self.bias_step(channel, Step::Down)
    }

    /// Reset every channel bias to 0 dB
    pub fn channels_bias_reset(&self) -> Result<()> {
        self.send(Command::ChannelBiasReset)
    }

    fn bias_step(&self, channel: &str, step: Step) -> Result<()> {
        self.ensure_open()?;
        let channel: Channel = channel.parse()?;
        let limit = match step {
            Step::Up => BIAS_MAX,
            Step::Down => BIAS_MIN,
        };
        let current = self.shared.state().channels_bias.value().get(&channel).copied();
        if current == Some(limit) {
            // The device does not answer a step past the limit
            tracing::debug!("Channel {} is already at {} dB", channel, limit);
            return Ok(());
        }
        self.send(Command::ChannelBiasStep(channel, step))
    }

    // ========== Session ==========

    /// Ask the device to report its full state again
    pub fn refresh(&self) -> Result<()> {
        self.ensure_open()?;
        self.queue_queries();
        Ok(())
    }

    /// Close the session and release the connection
    pub fn close(&self) {
        if self.shared.close() {
            tracing::info!("Closed session with {}", self.name);
        }
        self.cancel.cancel();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase() == Phase::Closed {
            Err(AvrError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn queue_queries(&self) {
        for query in INIT_QUERIES {
            let _ = self.commands.send((*query).to_string());
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.ensure_open()?;
        let line = command.encode(&self.shared.state())?;
        self.commands
            .send(line)
            .map_err(|_| AvrError::SessionClosed)
    }
}

impl Drop for AvrClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop<W>(
    mut writer: LineWriter<W>,
    mut commands: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = commands.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        if let Err(e) = writer.send_line(&line).await {
            tracing::error!("Failed to send {:?}: {}", line, e);
            cancel.cancel();
            break;
        }
    }
}

async fn read_loop<R>(
    mut reader: LineReader<R>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    name: String,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = reader.receive_line() => line,
        };
        match line {
            Ok(line) => shared.handle_line(&line),
            Err(e) => {
                tracing::warn!("Lost connection to {}: {}", name, e);
                break;
            }
        }
    }

    if shared.close() {
        tracing::info!("Session with {} closed", name);
    }
    cancel.cancel();
}
