//! Wire vocabulary of the Marantz/Denon telnet protocol.
//!
//! Every line starts with a two to five character family prefix followed by
//! a value in device shorthand. [`decode`] turns a received line into an
//! [`Event`]; [`Command::encode`] produces an outgoing line after validating
//! its argument against the current [`DeviceState`].

use crate::error::{AvrError, Result};
use crate::state::DeviceState;
use crate::types::{
    Channel, EcoMode, InputSource, PictureMode, PowerState, SoundMode, Zone, ZonePower,
    ZoneSource,
};

/// Default telnet port of the receivers
pub const DEFAULT_PORT: u16 = 23;

/// Line terminator used in both directions
pub const TERMINATOR: &str = "\r";

/// Highest volume the `MV` family can express
pub const VOLUME_CEILING: f64 = 98.0;

/// Channel bias range in dB
pub const BIAS_MIN: f64 = -12.0;
pub const BIAS_MAX: f64 = 12.0;

/// Bias levels are sent with this offset, `50` meaning 0 dB
const BIAS_OFFSET: f64 = 50.0;

/// Status queries sent after connecting and on refresh, in order
pub const INIT_QUERIES: &[&str] = &[
    "PW?", "ZM?", "Z2?", "Z3?", "MU?", "Z2MU?", "Z3MU?", "MV?", "SI?", "MS?", "PV?", "ECO?",
    "SSSOD ?", "CV?",
];

/// Families recognised by the decoder. Longer prefixes must come first.
const FAMILIES: &[&str] = &[
    "SSINFAISFSV",
    "SSSOD",
    "Z2MU",
    "Z3MU",
    "ECO",
    "PW",
    "ZM",
    "Z2",
    "Z3",
    "MU",
    "MV",
    "SI",
    "MS",
    "PV",
    "CV",
];

/// Abbreviations the device uses when reporting the active sound mode
const SOUND_MODE_EXPANSIONS: &[(&str, &str)] = &[
    ("Audio-", " "),
    ("Dd", "Dolby Digital "),
    ("DD", "Dolby Digital "),
    ("Dts", "DTS"),
    ("Mstr", "Master "),
    ("Dsur", "Digital Surround "),
    ("Mtrx", "Matrix"),
    ("Dscrt", "Discrete "),
    ("Mch", "Multi-Channel "),
    (" Es ", " ES "),
];

/// A decoded status line
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Power(PowerState),
    ZonePower(Zone, ZonePower),
    Mute(Zone, bool),
    Volume(Zone, f64),
    MaxVolume(f64),
    Source(InputSource),
    ZoneSource(Zone, ZoneSource),
    SoundMode(String),
    PictureMode(PictureMode),
    EcoMode(EcoMode),
    /// One channel of a bias report
    ChannelBias(Channel, f64),
    /// End of a bias report
    ChannelBiasEnd,
    /// One input of an availability report; `true` when the input is in use
    InputSample(InputSource, bool),
    /// End of an availability report
    InputListEnd,
    /// Sampling rate in kHz, `None` when there is no signal
    SamplingRate(Option<f64>),
    /// Unknown family or value
    Ignored,
}

/// Direction of a relative adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

impl Step {
    fn code(self) -> &'static str {
        match self {
            Step::Up => "UP",
            Step::Down => "DOWN",
        }
    }
}

/// An outgoing command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Power(PowerState),
    ZonePower(Zone, ZonePower),
    Mute(Zone, bool),
    Volume(Zone, f64),
    VolumeStep(Zone, Step),
    Source(Zone, InputSource),
    SoundMode(SoundMode),
    PictureMode(PictureMode),
    EcoMode(EcoMode),
    ChannelBias(Channel, f64),
    ChannelBiasStep(Channel, Step),
    ChannelBiasReset,
}

/// Decode one line received from the device
pub fn decode(line: &str) -> Event {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(family) = FAMILIES.iter().find(|f| line.starts_with(**f)) else {
        return Event::Ignored;
    };
    let value = &line[family.len()..];

    let event = match *family {
        "PW" => PowerState::from_code(value).map(Event::Power),
        "ZM" => ZonePower::from_code(value).map(|p| Event::ZonePower(Zone::Main, p)),
        "Z2" => decode_zone(Zone::Zone2, value),
        "Z3" => decode_zone(Zone::Zone3, value),
        "MU" => decode_on_off(value).map(|m| Event::Mute(Zone::Main, m)),
        "Z2MU" => decode_on_off(value).map(|m| Event::Mute(Zone::Zone2, m)),
        "Z3MU" => decode_on_off(value).map(|m| Event::Mute(Zone::Zone3, m)),
        "MV" => decode_main_volume(value),
        "SI" => InputSource::from_code(value).map(Event::Source),
        "MS" => decode_sound_mode(value).map(Event::SoundMode),
        "PV" => PictureMode::from_code(value).map(Event::PictureMode),
        "ECO" => EcoMode::from_code(value).map(Event::EcoMode),
        "CV" => decode_bias(value),
        "SSSOD" => decode_input_sample(value),
        "SSINFAISFSV" => decode_sampling_rate(value),
        _ => None,
    };

    event.unwrap_or_else(|| {
        tracing::trace!("Ignoring line {:?}", line);
        Event::Ignored
    })
}

fn decode_on_off(value: &str) -> Option<bool> {
    match value {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}

/// Two digits are whole units, three digits are tenths
fn decode_level(digits: &str) -> Option<f64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let raw: u32 = digits.parse().ok()?;
    if digits.len() > 2 {
        Some(f64::from(raw) / 10.0)
    } else {
        Some(f64::from(raw))
    }
}

fn decode_main_volume(value: &str) -> Option<Event> {
    if let Some(max) = value.strip_prefix("MAX") {
        return decode_level(max.trim()).map(Event::MaxVolume);
    }
    decode_level(value.trim()).map(|v| Event::Volume(Zone::Main, v))
}

/// `Z2`/`Z3` carry power, volume and source under the same prefix
fn decode_zone(zone: Zone, value: &str) -> Option<Event> {
    if let Some(power) = ZonePower::from_code(value) {
        return Some(Event::ZonePower(zone, power));
    }
    if value.starts_with("SMART") || value.starts_with("FAVORITE") {
        return None;
    }
    if let Some(level) = decode_level(value) {
        return Some(Event::Volume(zone, level));
    }
    if value == "SOURCE" {
        return Some(Event::ZoneSource(zone, ZoneSource::NoSource));
    }
    InputSource::from_code(value).map(|s| Event::ZoneSource(zone, ZoneSource::Input(s)))
}

fn decode_bias(value: &str) -> Option<Event> {
    if value == "END" {
        return Some(Event::ChannelBiasEnd);
    }
    let (code, level) = value.split_once(' ')?;
    let channel = Channel::from_code(code)?;
    let level = decode_level(level.trim())? - BIAS_OFFSET;
    Some(Event::ChannelBias(channel, level))
}

fn decode_input_sample(value: &str) -> Option<Event> {
    let value = value.trim();
    if value == "END" {
        return Some(Event::InputListEnd);
    }
    let (code, usage) = value.rsplit_once(' ')?;
    let source = InputSource::from_code(code.trim())?;
    match usage {
        "USE" => Some(Event::InputSample(source, true)),
        "DEL" => Some(Event::InputSample(source, false)),
        _ => None,
    }
}

fn decode_sampling_rate(value: &str) -> Option<Event> {
    let last = value.split(' ').next_back()?;
    if last == "NON" {
        return Some(Event::SamplingRate(None));
    }
    let digits: String = last.chars().filter(char::is_ascii_digit).collect();
    let raw: u32 = digits.parse().ok()?;
    let rate = if raw > 200 {
        f64::from(raw) / 10.0
    } else {
        f64::from(raw)
    };
    Some(Event::SamplingRate(Some(rate)))
}

/// The device reports sound modes in an abbreviated upper-case form
/// (`DOLBY D+DS`, `MCH STEREO`); turn them into readable names.
fn decode_sound_mode(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }
    if let Some(mode) = SoundMode::from_code(value) {
        return Some(mode.label().to_string());
    }
    let mut text = title_case(&value.replace('+', " "));
    for (short, long) in SOUND_MODE_EXPANSIONS {
        text = text.replace(short, long);
    }

    let mut cleaned = String::with_capacity(text.len());
    let mut gap = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if gap && !cleaned.is_empty() {
                cleaned.push(' ');
            }
            cleaned.push(c);
            gap = false;
        } else {
            gap = true;
        }
    }
    Some(cleaned)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Whole values use two digits, half steps three digits in tenths
fn encode_level(level: f64) -> String {
    let tenths = (level * 10.0).round() as i64;
    if tenths % 10 == 0 {
        format!("{:02}", tenths / 10)
    } else {
        format!("{:03}", tenths)
    }
}

fn ensure_finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AvrError::invalid(format!("{} must be a finite number", what)))
    }
}

impl Command {
    /// Validate the argument against `state` and produce the wire line
    /// (without terminator).
    pub fn encode(&self, state: &DeviceState) -> Result<String> {
        match self {
            Command::Power(power) => Ok(format!("PW{}", power.code())),
            Command::ZonePower(zone, power) => {
                Ok(format!("{}{}", zone.power_prefix(), power.code()))
            }
            Command::Mute(zone, muted) => Ok(format!(
                "{}{}",
                zone.mute_prefix(),
                if *muted { "ON" } else { "OFF" }
            )),
            Command::Volume(zone, level) => {
                ensure_finite(*level, "Volume")?;
                let max = state.max_volume.unwrap_or(VOLUME_CEILING);
                let (step, what) = match zone {
                    Zone::Main => (0.5, "Volume"),
                    _ => (1.0, "Zone volume"),
                };
                let level = round_to_step(*level, step);
                if !(0.0..=max).contains(&level) {
                    return Err(AvrError::invalid(format!(
                        "{} {} is outside 0..={}",
                        what, level, max
                    )));
                }
                Ok(format!("{}{}", zone.volume_prefix(), encode_level(level)))
            }
            Command::VolumeStep(zone, step) => {
                Ok(format!("{}{}", zone.volume_prefix(), step.code()))
            }
            Command::Source(zone, source) => {
                if !state.source_list().contains(source) {
                    return Err(AvrError::invalid(format!(
                        "{} is not an available source",
                        source
                    )));
                }
                Ok(format!("{}{}", zone.source_prefix(), source.code()))
            }
            Command::SoundMode(mode) => {
                if !state.sound_mode_list().contains(mode) {
                    return Err(AvrError::invalid(format!("{} is not a sound mode", mode)));
                }
                Ok(format!("MS{}", mode.code()))
            }
            Command::PictureMode(mode) => {
                if !state.picture_mode_list().contains(mode) {
                    return Err(AvrError::invalid(format!("{} is not a picture mode", mode)));
                }
                Ok(format!("PV{}", mode.code()))
            }
            Command::EcoMode(mode) => {
                if !state.eco_mode_list().contains(mode) {
                    return Err(AvrError::invalid(format!("{} is not an eco mode", mode)));
                }
                Ok(format!("ECO{}", mode.code()))
            }
            Command::ChannelBias(channel, level) => {
                ensure_finite(*level, "Channel bias")?;
                ensure_channel(state, *channel)?;
                let level = round_to_step(*level, 0.5).clamp(BIAS_MIN, BIAS_MAX);
                Ok(format!(
                    "CV{} {}",
                    channel.code(),
                    encode_level(level + BIAS_OFFSET)
                ))
            }
            Command::ChannelBiasStep(channel, step) => {
                ensure_channel(state, *channel)?;
                Ok(format!("CV{} {}", channel.code(), step.code()))
            }
            Command::ChannelBiasReset => Ok("CVZRL".to_string()),
        }
    }
}

fn ensure_channel(state: &DeviceState, channel: Channel) -> Result<()> {
    if state.channels_bias.value().contains_key(&channel) {
        Ok(())
    } else {
        Err(AvrError::invalid(format!(
            "Channel {} is not available right now",
            channel
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_channels(channels: &[Channel]) -> DeviceState {
        let mut state = DeviceState::default();
        for channel in channels {
            state.apply(&Event::ChannelBias(*channel, 0.0));
        }
        state.apply(&Event::ChannelBiasEnd);
        state
    }

    #[test]
    fn test_decode_power() {
        assert_eq!(decode("PWON"), Event::Power(PowerState::On));
        assert_eq!(decode("PWSTANDBY\r"), Event::Power(PowerState::Standby));
        assert_eq!(decode("ZMOFF"), Event::ZonePower(Zone::Main, ZonePower::Off));
    }

    #[test]
    fn test_decode_volume() {
        assert_eq!(decode("MV675"), Event::Volume(Zone::Main, 67.5));
        assert_eq!(decode("MV50"), Event::Volume(Zone::Main, 50.0));
        assert_eq!(decode("MV05"), Event::Volume(Zone::Main, 5.0));
        assert_eq!(decode("MVMAX 98"), Event::MaxVolume(98.0));
        assert_eq!(decode("MVMAX 805"), Event::MaxVolume(80.5));
        assert_eq!(decode("MV"), Event::Ignored);
        assert_eq!(decode("MVabc"), Event::Ignored);
    }

    #[test]
    fn test_decode_zone_prefix_overloads() {
        assert_eq!(decode("Z2ON"), Event::ZonePower(Zone::Zone2, ZonePower::On));
        assert_eq!(decode("Z340"), Event::Volume(Zone::Zone3, 40.0));
        assert_eq!(
            decode("Z2CD"),
            Event::ZoneSource(Zone::Zone2, ZoneSource::Input(InputSource::Cd))
        );
        assert_eq!(decode("Z3SOURCE"), Event::ZoneSource(Zone::Zone3, ZoneSource::NoSource));
        assert_eq!(decode("Z2SMART1"), Event::Ignored);
        assert_eq!(decode("Z2FAVORITE3"), Event::Ignored);
        assert_eq!(decode("Z2MUON"), Event::Mute(Zone::Zone2, true));
        assert_eq!(decode("Z3MUOFF"), Event::Mute(Zone::Zone3, false));
    }

    #[test]
    fn test_decode_source_and_modes() {
        assert_eq!(decode("MUON"), Event::Mute(Zone::Main, true));
        assert_eq!(decode("SISAT/CBL"), Event::Source(InputSource::SetTopBox));
        assert_eq!(decode("PVMOV"), Event::PictureMode(PictureMode::Movie));
        assert_eq!(decode("ECOAUTO"), Event::EcoMode(EcoMode::Auto));
        assert_eq!(decode("SIUNKNOWN"), Event::Ignored);
    }

    #[test]
    fn test_decode_sound_mode_expands_abbreviations() {
        assert_eq!(decode("MSSTEREO"), Event::SoundMode("Stereo".to_string()));
        assert_eq!(
            decode("MSMCH STEREO"),
            Event::SoundMode("Multi Channel Stereo".to_string())
        );
        assert_eq!(
            decode("MSDOLBY DIGITAL"),
            Event::SoundMode("Dolby Digital".to_string())
        );
        assert_eq!(
            decode("MSDTS SURROUND"),
            Event::SoundMode("DTS Surround".to_string())
        );
        assert_eq!(decode("MSPURE DIRECT"), Event::SoundMode("Pure Direct".to_string()));
    }

    #[test]
    fn test_decode_bias_batch_lines() {
        assert_eq!(decode("CVFL 50"), Event::ChannelBias(Channel::FrontLeft, 0.0));
        assert_eq!(decode("CVSW 505"), Event::ChannelBias(Channel::Subwoofer, 0.5));
        assert_eq!(decode("CVC 38"), Event::ChannelBias(Channel::Centre, -12.0));
        assert_eq!(decode("CVEND"), Event::ChannelBiasEnd);
        assert_eq!(decode("CVXX 50"), Event::Ignored);
    }

    #[test]
    fn test_decode_input_list_lines() {
        assert_eq!(decode("SSSODCD USE"), Event::InputSample(InputSource::Cd, true));
        assert_eq!(decode("SSSODAUX2 DEL"), Event::InputSample(InputSource::Aux2, false));
        assert_eq!(decode("SSSOD END"), Event::InputListEnd);
    }

    #[test]
    fn test_decode_sampling_rate() {
        assert_eq!(decode("SSINFAISFSV 441"), Event::SamplingRate(Some(44.1)));
        assert_eq!(decode("SSINFAISFSV 48"), Event::SamplingRate(Some(48.0)));
        assert_eq!(decode("SSINFAISFSV NON"), Event::SamplingRate(None));
    }

    #[test]
    fn test_decode_unknown_family_is_ignored() {
        assert_eq!(decode("XYZ123"), Event::Ignored);
        assert_eq!(decode(""), Event::Ignored);
        assert_eq!(decode("PSFRONT A"), Event::Ignored);
    }

    #[test]
    fn test_encode_volume() {
        let state = DeviceState::default();
        let encode = |v| Command::Volume(Zone::Main, v).encode(&state).unwrap();
        assert_eq!(encode(67.5), "MV675");
        assert_eq!(encode(50.0), "MV50");
        assert_eq!(encode(5.0), "MV05");
        assert_eq!(encode(67.3), "MV675");
        assert_eq!(
            Command::Volume(Zone::Zone2, 40.4).encode(&state).unwrap(),
            "Z240"
        );
    }

    #[test]
    fn test_encode_volume_rejects_out_of_range() {
        let mut state = DeviceState::default();
        let err = Command::Volume(Zone::Main, 150.0).encode(&state).unwrap_err();
        assert!(matches!(err, AvrError::InvalidArgument(_)));
        assert!(Command::Volume(Zone::Main, -1.0).encode(&state).is_err());
        assert!(Command::Volume(Zone::Main, f64::NAN).encode(&state).is_err());

        state.apply(&Event::MaxVolume(80.0));
        assert!(Command::Volume(Zone::Main, 85.0).encode(&state).is_err());
        assert!(Command::Volume(Zone::Main, 80.0).encode(&state).is_ok());
    }

    #[test]
    fn test_encode_bias_rounds_and_clamps() {
        let state = state_with_channels(&[Channel::FrontLeft]);
        let encode = |v| {
            Command::ChannelBias(Channel::FrontLeft, v)
                .encode(&state)
                .unwrap()
        };
        assert_eq!(encode(0.5), "CVFL 505");
        assert_eq!(encode(0.0), "CVFL 50");
        assert_eq!(encode(-12.0), "CVFL 38");
        assert_eq!(encode(20.0), "CVFL 62");
        assert_eq!(encode(-3.3), "CVFL 465");
    }

    #[test]
    fn test_encode_bias_requires_known_channel() {
        let state = state_with_channels(&[Channel::FrontLeft]);
        let err = Command::ChannelBias(Channel::Centre, 0.0)
            .encode(&state)
            .unwrap_err();
        assert!(matches!(err, AvrError::InvalidArgument(_)));
        assert!(Command::ChannelBiasStep(Channel::Centre, Step::Up)
            .encode(&state)
            .is_err());
        assert_eq!(
            Command::ChannelBiasStep(Channel::FrontLeft, Step::Down)
                .encode(&state)
                .unwrap(),
            "CVFL DOWN"
        );
    }

    #[test]
    fn test_encode_source_checks_learned_list() {
        let mut state = DeviceState::default();
        assert_eq!(
            Command::Source(Zone::Main, InputSource::Tuner)
                .encode(&state)
                .unwrap(),
            "SITUNER"
        );

        state.apply(&Event::InputSample(InputSource::Cd, true));
        state.apply(&Event::InputSample(InputSource::Tuner, false));
        state.apply(&Event::InputListEnd);
        assert!(Command::Source(Zone::Main, InputSource::Tuner)
            .encode(&state)
            .is_err());
        assert_eq!(
            Command::Source(Zone::Zone2, InputSource::Cd)
                .encode(&state)
                .unwrap(),
            "Z2CD"
        );
    }

    #[test]
    fn test_encode_simple_commands() {
        let state = DeviceState::default();
        let cases = [
            (Command::Power(PowerState::On), "PWON"),
            (Command::Power(PowerState::Standby), "PWSTANDBY"),
            (Command::ZonePower(Zone::Zone3, ZonePower::Off), "Z3OFF"),
            (Command::Mute(Zone::Main, true), "MUON"),
            (Command::Mute(Zone::Zone2, false), "Z2MUOFF"),
            (Command::VolumeStep(Zone::Main, Step::Up), "MVUP"),
            (Command::VolumeStep(Zone::Zone2, Step::Down), "Z2DOWN"),
            (Command::SoundMode(SoundMode::PureDirect), "MSPURE DIRECT"),
            (Command::PictureMode(PictureMode::IsfDay), "PVDAY"),
            (Command::EcoMode(EcoMode::Auto), "ECOAUTO"),
            (Command::ChannelBiasReset, "CVZRL"),
        ];
        for (command, expected) in cases {
            assert_eq!(command.encode(&state).unwrap(), expected);
        }
    }

    #[test]
    fn test_round_trip_within_step() {
        let state = state_with_channels(&[Channel::Subwoofer]);

        for level in [0.0, 0.5, 12.0, 67.5, 98.0] {
            let line = Command::Volume(Zone::Main, level).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::Volume(Zone::Main, level));
        }
        for level in [-12.0, -0.5, 0.0, 3.5, 12.0] {
            let line = Command::ChannelBias(Channel::Subwoofer, level)
                .encode(&state)
                .unwrap();
            assert_eq!(decode(&line), Event::ChannelBias(Channel::Subwoofer, level));
        }
        for source in InputSource::ALL {
            let line = Command::Source(Zone::Main, *source).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::Source(*source));
        }
        let line = Command::Source(Zone::Zone3, InputSource::Bluetooth)
            .encode(&state)
            .unwrap();
        assert_eq!(
            decode(&line),
            Event::ZoneSource(Zone::Zone3, ZoneSource::Input(InputSource::Bluetooth))
        );
        for mode in PictureMode::ALL {
            let line = Command::PictureMode(*mode).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::PictureMode(*mode));
        }
        for mode in EcoMode::ALL {
            let line = Command::EcoMode(*mode).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::EcoMode(*mode));
        }
        for mode in SoundMode::ALL {
            let line = Command::SoundMode(*mode).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::SoundMode(mode.label().to_string()));
        }
    }

    #[test]
    fn test_zone_round_trip_within_step() {
        let state = DeviceState::default();

        for zone in [Zone::Zone2, Zone::Zone3] {
            for level in [0.0, 1.0, 30.0, 98.0] {
                let line = Command::Volume(zone, level).encode(&state).unwrap();
                assert_eq!(decode(&line), Event::Volume(zone, level));
            }
            // Secondary zones move in whole dB
            let line = Command::Volume(zone, 30.4).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::Volume(zone, 30.0));
        }

        for zone in [Zone::Main, Zone::Zone2, Zone::Zone3] {
            for muted in [true, false] {
                let line = Command::Mute(zone, muted).encode(&state).unwrap();
                assert_eq!(decode(&line), Event::Mute(zone, muted));
            }
            for power in ZonePower::ALL {
                let line = Command::ZonePower(zone, *power).encode(&state).unwrap();
                assert_eq!(decode(&line), Event::ZonePower(zone, *power));
            }
        }

        for power in PowerState::ALL {
            let line = Command::Power(*power).encode(&state).unwrap();
            assert_eq!(decode(&line), Event::Power(*power));
        }
    }
}
