use crate::protocol::Event;
use crate::types::{
    Channel, EcoMode, InputSource, PictureMode, PowerState, SoundMode, Zone, ZonePower,
    ZoneSource,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A value that is replaced wholesale, with a counter bumped on every
/// replacement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    value: T,
    version: u64,
}

impl<T: Default> Default for Versioned<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            version: 0,
        }
    }
}

impl<T> Versioned<T> {
    /// Current value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Number of completed replacements, `0` until the device has reported
    pub fn version(&self) -> u64 {
        self.version
    }

    fn replace(&mut self, value: T) {
        self.value = value;
        self.version += 1;
    }
}

/// Name of an observable attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Power,
    MainPower,
    Z2Power,
    Z3Power,
    Muted,
    Z2Muted,
    Z3Muted,
    Volume,
    Z2Volume,
    Z3Volume,
    MaxVolume,
    Source,
    Z2Source,
    Z3Source,
    SourceList,
    SoundMode,
    PictureMode,
    EcoMode,
    ChannelsBias,
    ChannelsBiasList,
    SamplingRate,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Power => "power",
            Field::MainPower => "main_power",
            Field::Z2Power => "z2_power",
            Field::Z3Power => "z3_power",
            Field::Muted => "muted",
            Field::Z2Muted => "z2_muted",
            Field::Z3Muted => "z3_muted",
            Field::Volume => "volume",
            Field::Z2Volume => "z2_volume",
            Field::Z3Volume => "z3_volume",
            Field::MaxVolume => "max_volume",
            Field::Source => "source",
            Field::Z2Source => "z2_source",
            Field::Z3Source => "z3_source",
            Field::SourceList => "source_list",
            Field::SoundMode => "sound_mode",
            Field::PictureMode => "picture_mode",
            Field::EcoMode => "eco_mode",
            Field::ChannelsBias => "channels_bias",
            Field::ChannelsBiasList => "channels_bias_list",
            Field::SamplingRate => "sampling_rate",
        }
    }

    fn power(zone: Zone) -> Self {
        match zone {
            Zone::Main => Field::MainPower,
            Zone::Zone2 => Field::Z2Power,
            Zone::Zone3 => Field::Z3Power,
        }
    }

    fn muted(zone: Zone) -> Self {
        match zone {
            Zone::Main => Field::Muted,
            Zone::Zone2 => Field::Z2Muted,
            Zone::Zone3 => Field::Z3Muted,
        }
    }

    fn volume(zone: Zone) -> Self {
        match zone {
            Zone::Main => Field::Volume,
            Zone::Zone2 => Field::Z2Volume,
            Zone::Zone3 => Field::Z3Volume,
        }
    }

    fn source(zone: Zone) -> Self {
        match zone {
            Zone::Main => Field::Source,
            Zone::Zone2 => Field::Z2Source,
            Zone::Zone3 => Field::Z3Source,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value of an attribute, as handed to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Bias(BTreeMap<String, f64>),
    Unknown,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
            Value::Bias(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Unknown => f.write_str("-"),
        }
    }
}

fn text<T: fmt::Display>(value: Option<T>) -> Value {
    value.map_or(Value::Unknown, |v| Value::Text(v.to_string()))
}

fn number(value: Option<f64>) -> Value {
    value.map_or(Value::Unknown, Value::Number)
}

fn flag(value: Option<bool>) -> Value {
    value.map_or(Value::Unknown, Value::Bool)
}

/// A change produced by applying an event
pub type Change = (Field, Value);

/// Everything known about the receiver
///
/// Fields start out unknown and are filled in as the device reports them.
/// Copies handed out by the client are snapshots; the live state is only
/// written by the session's receive loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceState {
    pub power: Option<PowerState>,
    pub main_power: Option<ZonePower>,
    pub z2_power: Option<ZonePower>,
    pub z3_power: Option<ZonePower>,

    pub muted: Option<bool>,
    pub z2_muted: Option<bool>,
    pub z3_muted: Option<bool>,

    pub volume: Option<f64>,
    pub z2_volume: Option<f64>,
    pub z3_volume: Option<f64>,
    pub max_volume: Option<f64>,

    pub source: Option<InputSource>,
    pub z2_source: Option<ZoneSource>,
    pub z3_source: Option<ZoneSource>,

    /// Inputs the device reported as in use
    pub source_list: Versioned<BTreeSet<InputSource>>,

    /// Active sound mode as reported, which may be more specific than the
    /// settable modes
    pub sound_mode: Option<String>,
    pub picture_mode: Option<PictureMode>,
    pub eco_mode: Option<EcoMode>,

    /// Bias per channel from the last complete report
    pub channels_bias: Versioned<BTreeMap<Channel, f64>>,

    pub sampling_rate: Option<f64>,

    #[serde(skip)]
    pending_bias: Option<BTreeMap<Channel, f64>>,
    #[serde(skip)]
    pending_sources: Option<BTreeSet<InputSource>>,
}

impl DeviceState {
    /// Inputs that may be selected. Until the device has reported its input
    /// list, every known input is accepted.
    pub fn source_list(&self) -> BTreeSet<InputSource> {
        if self.source_list.version() == 0 {
            InputSource::ALL.iter().copied().collect()
        } else {
            self.source_list.value().clone()
        }
    }

    pub fn sound_mode_list(&self) -> &'static [SoundMode] {
        SoundMode::ALL
    }

    pub fn picture_mode_list(&self) -> &'static [PictureMode] {
        PictureMode::ALL
    }

    pub fn eco_mode_list(&self) -> &'static [EcoMode] {
        EcoMode::ALL
    }

    /// Channels present in the last complete bias report
    pub fn channels_bias_list(&self) -> BTreeSet<Channel> {
        self.channels_bias.value().keys().copied().collect()
    }

    /// Current value of `field`
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Power => text(self.power),
            Field::MainPower => text(self.main_power),
            Field::Z2Power => text(self.z2_power),
            Field::Z3Power => text(self.z3_power),
            Field::Muted => flag(self.muted),
            Field::Z2Muted => flag(self.z2_muted),
            Field::Z3Muted => flag(self.z3_muted),
            Field::Volume => number(self.volume),
            Field::Z2Volume => number(self.z2_volume),
            Field::Z3Volume => number(self.z3_volume),
            Field::MaxVolume => number(self.max_volume),
            Field::Source => text(self.source),
            Field::Z2Source => text(self.z2_source),
            Field::Z3Source => text(self.z3_source),
            Field::SourceList => Value::List(
                self.source_list
                    .value()
                    .iter()
                    .map(|s| s.label().to_string())
                    .collect(),
            ),
            Field::SoundMode => text(self.sound_mode.as_deref()),
            Field::PictureMode => text(self.picture_mode),
            Field::EcoMode => text(self.eco_mode),
            Field::ChannelsBias => Value::Bias(
                self.channels_bias
                    .value()
                    .iter()
                    .map(|(c, v)| (c.label().to_string(), *v))
                    .collect(),
            ),
            Field::ChannelsBiasList => Value::List(
                self.channels_bias
                    .value()
                    .keys()
                    .map(|c| c.label().to_string())
                    .collect(),
            ),
            Field::SamplingRate => number(self.sampling_rate),
        }
    }

    /// Apply a decoded event and return the fields whose value changed, in
    /// order
    pub fn apply(&mut self, event: &Event) -> Vec<Change> {
        let fields = affected_fields(event);
        let before: Vec<Value> = fields.iter().map(|f| self.get(*f)).collect();

        self.write(event);

        fields
            .iter()
            .zip(before)
            .filter_map(|(field, old)| {
                let new = self.get(*field);
                (new != old).then_some((*field, new))
            })
            .collect()
    }

    fn write(&mut self, event: &Event) {
        match event {
            Event::Power(power) => self.power = Some(*power),
            Event::ZonePower(zone, power) => match zone {
                Zone::Main => self.main_power = Some(*power),
                Zone::Zone2 => self.z2_power = Some(*power),
                Zone::Zone3 => self.z3_power = Some(*power),
            },
            Event::Mute(zone, muted) => match zone {
                Zone::Main => self.muted = Some(*muted),
                Zone::Zone2 => self.z2_muted = Some(*muted),
                Zone::Zone3 => self.z3_muted = Some(*muted),
            },
            Event::Volume(zone, level) => match zone {
                Zone::Main => self.volume = Some(*level),
                Zone::Zone2 => self.z2_volume = Some(*level),
                Zone::Zone3 => self.z3_volume = Some(*level),
            },
            Event::MaxVolume(level) => self.max_volume = Some(*level),
            Event::Source(source) => self.source = Some(*source),
            Event::ZoneSource(zone, source) => match zone {
                Zone::Main => {
                    if let ZoneSource::Input(input) = source {
                        self.source = Some(*input);
                    }
                }
                Zone::Zone2 => self.z2_source = Some(*source),
                Zone::Zone3 => self.z3_source = Some(*source),
            },
            Event::SoundMode(mode) => self.sound_mode = Some(mode.clone()),
            Event::PictureMode(mode) => self.picture_mode = Some(*mode),
            Event::EcoMode(mode) => self.eco_mode = Some(*mode),
            Event::ChannelBias(channel, level) => {
                self.pending_bias
                    .get_or_insert_with(BTreeMap::new)
                    .insert(*channel, *level);
            }
            Event::ChannelBiasEnd => {
                if let Some(batch) = self.pending_bias.take() {
                    self.channels_bias.replace(batch);
                }
            }
            Event::InputSample(source, in_use) => {
                let batch = self.pending_sources.get_or_insert_with(BTreeSet::new);
                if *in_use {
                    batch.insert(*source);
                }
            }
            Event::InputListEnd => {
                if let Some(batch) = self.pending_sources.take() {
                    self.source_list.replace(batch);
                }
            }
            Event::SamplingRate(rate) => self.sampling_rate = *rate,
            Event::Ignored => {}
        }
    }
}

/// Fields an event can touch. Batch samples touch nothing until their end
/// marker arrives.
fn affected_fields(event: &Event) -> Vec<Field> {
    match event {
        Event::Power(_) => vec![Field::Power],
        Event::ZonePower(zone, _) => vec![Field::power(*zone)],
        Event::Mute(zone, _) => vec![Field::muted(*zone)],
        Event::Volume(zone, _) => vec![Field::volume(*zone)],
        Event::MaxVolume(_) => vec![Field::MaxVolume],
        Event::Source(_) => vec![Field::Source],
        Event::ZoneSource(zone, _) => vec![Field::source(*zone)],
        Event::SoundMode(_) => vec![Field::SoundMode],
        Event::PictureMode(_) => vec![Field::PictureMode],
        Event::EcoMode(_) => vec![Field::EcoMode],
        Event::ChannelBiasEnd => vec![Field::ChannelsBiasList, Field::ChannelsBias],
        Event::InputListEnd => vec![Field::SourceList],
        Event::SamplingRate(_) => vec![Field::SamplingRate],
        Event::ChannelBias(..) | Event::InputSample(..) | Event::Ignored => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    fn feed(state: &mut DeviceState, lines: &[&str]) -> Vec<Change> {
        lines
            .iter()
            .flat_map(|line| state.apply(&decode(line)))
            .collect()
    }

    #[test]
    fn test_fresh_state_is_unknown() {
        let state = DeviceState::default();
        assert_eq!(state.power, None);
        assert_eq!(state.max_volume, None);
        assert_eq!(state.get(Field::Volume), Value::Unknown);
        assert!(state.channels_bias_list().is_empty());
        assert_eq!(state.source_list().len(), InputSource::ALL.len());
    }

    #[test]
    fn test_power_change_is_reported_once() {
        let mut state = DeviceState::default();
        feed(&mut state, &["PWSTANDBY"]);

        let changes = feed(&mut state, &["PWON", "PWON"]);
        assert_eq!(changes, vec![(Field::Power, Value::Text("On".to_string()))]);
        assert_eq!(state.power, Some(PowerState::On));
    }

    #[test]
    fn test_volume_on_fresh_state() {
        let mut state = DeviceState::default();
        let changes = feed(&mut state, &["MV675"]);
        assert_eq!(changes, vec![(Field::Volume, Value::Number(67.5))]);
        assert_eq!(state.volume, Some(67.5));
    }

    #[test]
    fn test_ignored_line_changes_nothing() {
        let mut state = DeviceState::default();
        assert!(feed(&mut state, &["GARBAGE", "PSFRONT A"]).is_empty());
    }

    #[test]
    fn test_bias_batch_commits_on_end() {
        let mut state = DeviceState::default();
        assert!(feed(&mut state, &["CVFL 50", "CVFR 505"]).is_empty());
        assert!(state.channels_bias_list().is_empty());

        let changes = feed(&mut state, &["CVEND"]);
        let fields: Vec<Field> = changes.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec![Field::ChannelsBiasList, Field::ChannelsBias]);
        assert_eq!(state.channels_bias.value().get(&Channel::FrontRight), Some(&0.5));
        assert_eq!(state.channels_bias.version(), 1);
    }

    #[test]
    fn test_bias_batch_replaces_previous_channels() {
        let mut state = DeviceState::default();
        feed(&mut state, &["CVFL 50", "CVFR 50", "CVEND"]);
        feed(&mut state, &["CVC 50", "CVSW 52", "CVEND"]);

        let expected: BTreeSet<Channel> = [Channel::Centre, Channel::Subwoofer].into();
        assert_eq!(state.channels_bias_list(), expected);
        assert_eq!(state.channels_bias.value().get(&Channel::Subwoofer), Some(&2.0));
        assert_eq!(state.channels_bias.version(), 2);
    }

    #[test]
    fn test_identical_bias_batch_is_silent() {
        let mut state = DeviceState::default();
        feed(&mut state, &["CVFL 50", "CVEND"]);
        assert!(feed(&mut state, &["CVFL 50", "CVEND"]).is_empty());
    }

    #[test]
    fn test_source_list_batch() {
        let mut state = DeviceState::default();
        let changes = feed(
            &mut state,
            &["SSSODCD USE", "SSSODTUNER DEL", "SSSODBT USE", "SSSOD END"],
        );
        assert_eq!(
            changes,
            vec![(
                Field::SourceList,
                Value::List(vec!["CD".to_string(), "Bluetooth".to_string()])
            )]
        );
        let expected: BTreeSet<InputSource> = [InputSource::Cd, InputSource::Bluetooth].into();
        assert_eq!(state.source_list(), expected);
    }

    #[test]
    fn test_zone_fields_are_independent() {
        let mut state = DeviceState::default();
        let changes = feed(&mut state, &["Z2ON", "Z250", "Z2SOURCE", "Z3MUON"]);
        let fields: Vec<Field> = changes.iter().map(|(f, _)| *f).collect();
        assert_eq!(
            fields,
            vec![Field::Z2Power, Field::Z2Volume, Field::Z2Source, Field::Z3Muted]
        );
        assert_eq!(state.z2_source, Some(ZoneSource::NoSource));
        assert_eq!(state.volume, None);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(Field::ChannelsBiasList.to_string(), "channels_bias_list");
        assert_eq!(Field::Z2Volume.as_str(), "z2_volume");
    }
}
