use crate::error::AvrError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Declares an enumeration that is spelled one way on the wire and another way
/// to humans. Lookups by label ignore case and whitespace.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => ($code:literal, $label:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $(
                #[doc = $label]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Code used on the wire
            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Human readable name
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Look up a variant from its wire code
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = AvrError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = squash(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| squash(v.label()) == wanted || v.code() == s)
                    .ok_or_else(|| {
                        AvrError::invalid(format!("{:?} is not a valid {}", s, stringify!($name)))
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

wire_enum! {
    /// Overall power state (`PW`)
    PowerState {
        On => ("ON", "On"),
        Standby => ("STANDBY", "Standby"),
    }
}

wire_enum! {
    /// Per-zone power state (`ZM`, `Z2`, `Z3`)
    ZonePower {
        On => ("ON", "On"),
        Off => ("OFF", "Off"),
    }
}

wire_enum! {
    /// ECO power-saving mode
    EcoMode {
        On => ("ON", "On"),
        Off => ("OFF", "Off"),
        Auto => ("AUTO", "Auto"),
    }
}

wire_enum! {
    /// Input source
    InputSource {
        Phono => ("PHONO", "Phono"),
        Cd => ("CD", "CD"),
        Dvd => ("DVD", "DVD"),
        Bluray => ("BD", "Bluray"),
        Tv => ("TV", "TV"),
        SetTopBox => ("SAT/CBL", "Set Top Box"),
        MediaPlayer => ("MPLAY", "Media Player"),
        Game => ("GAME", "Game"),
        Tuner => ("TUNER", "Tuner"),
        HdRadio => ("HDRADIO", "HD Radio"),
        SiriusXm => ("SIRIUSXM", "Sirius XM"),
        Pandora => ("PANDORA", "Pandora"),
        InternetRadio => ("IRADIO", "Internet Radio"),
        Server => ("SERVER", "Server"),
        Favourites => ("FAVORITES", "Favourites"),
        Aux1 => ("AUX1", "Aux1"),
        Aux2 => ("AUX2", "Aux2"),
        Aux3 => ("AUX3", "Aux3"),
        Aux4 => ("AUX4", "Aux4"),
        Aux5 => ("AUX5", "Aux5"),
        Aux6 => ("AUX6", "Aux6"),
        Aux7 => ("AUX7", "Aux7"),
        OnlineMusic => ("NET", "Online Music"),
        Bluetooth => ("BT", "Bluetooth"),
    }
}

wire_enum! {
    /// Settable surround/sound mode
    SoundMode {
        Movie => ("MOVIE", "Movie"),
        Music => ("MUSIC", "Music"),
        Game => ("GAME", "Game"),
        Direct => ("DIRECT", "Direct"),
        PureDirect => ("PURE DIRECT", "Pure Direct"),
        Stereo => ("STEREO", "Stereo"),
        Auto => ("AUTO", "Auto"),
        DolbyDigital => ("DOLBY DIGITAL", "Dolby Digital"),
        DtsSurround => ("DTS SURROUND", "DTS Surround"),
        Auro3d => ("AURO3D", "Auro3D"),
        Auro2dSurround => ("AURO2DSURR", "Auro2D Surround"),
        MultiChannelStereo => ("MCH STEREO", "Multi Channel Stereo"),
        Virtual => ("VIRTUAL", "Virtual"),
    }
}

wire_enum! {
    /// Video picture mode
    PictureMode {
        Off => ("OFF", "Off"),
        Standard => ("STD", "Standard"),
        Movie => ("MOV", "Movie"),
        Vivid => ("VVD", "Vivid"),
        Stream => ("STM", "Stream"),
        Custom => ("CTM", "Custom"),
        IsfDay => ("DAY", "ISF Day"),
        IsfNight => ("NGT", "ISF Night"),
    }
}

wire_enum! {
    /// Speaker channel that carries a bias trim
    Channel {
        FrontLeft => ("FL", "Front Left"),
        FrontRight => ("FR", "Front Right"),
        Centre => ("C", "Centre"),
        Subwoofer => ("SW", "Subwoofer"),
        Subwoofer2 => ("SW2", "Subwoofer2"),
        SurroundLeft => ("SL", "Surround Left"),
        SurroundRight => ("SR", "Surround Right"),
        SurroundBackLeft => ("SBL", "Surround Back Left"),
        SurroundBackRight => ("SBR", "Surround Back Right"),
        FrontHeightLeft => ("FHL", "Front Height Left"),
        FrontHeightRight => ("FHR", "Front Height Right"),
        FrontWideLeft => ("FWL", "Front Wide Left"),
        FrontWideRight => ("FWR", "Front Wide Right"),
        FrontTopLeft => ("TFL", "Front Top Left"),
        FrontTopRight => ("TFR", "Front Top Right"),
        MiddleTopLeft => ("TML", "Middle Top Left"),
        MiddleTopRight => ("TMR", "Middle Top Right"),
        RearTopLeft => ("TRL", "Rear Top Left"),
        RearTopRight => ("TRR", "Rear Top Right"),
        RearHeightLeft => ("RHL", "Rear Height Left"),
        RearHeightRight => ("RHR", "Rear Height Right"),
        FrontDolbyLeft => ("FDL", "Front Dolby Left"),
        FrontDolbyRight => ("FDR", "Front Dolby Right"),
        SurroundDolbyLeft => ("SDL", "Surround Dolby Left"),
        SurroundDolbyRight => ("SDR", "Surround Dolby Right"),
        BackDolbyLeft => ("BDL", "Back Dolby Left"),
        BackDolbyRight => ("BDR", "Back Dolby Right"),
        SurroundHeightLeft => ("SHL", "Surround Height Left"),
        SurroundHeightRight => ("SHR", "Surround Height Right"),
        TopSurround => ("TS", "Top Surround"),
        CentreHeight => ("CH", "Centre Height"),
    }
}

/// Output zone of the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Zone {
    Main,
    Zone2,
    Zone3,
}

impl Zone {
    /// Prefix of the zone power family
    pub(crate) fn power_prefix(self) -> &'static str {
        match self {
            Zone::Main => "ZM",
            Zone::Zone2 => "Z2",
            Zone::Zone3 => "Z3",
        }
    }

    /// Prefix of the zone mute family
    pub(crate) fn mute_prefix(self) -> &'static str {
        match self {
            Zone::Main => "MU",
            Zone::Zone2 => "Z2MU",
            Zone::Zone3 => "Z3MU",
        }
    }

    /// Prefix shared by volume and source for the secondary zones
    pub(crate) fn volume_prefix(self) -> &'static str {
        match self {
            Zone::Main => "MV",
            Zone::Zone2 => "Z2",
            Zone::Zone3 => "Z3",
        }
    }

    pub(crate) fn source_prefix(self) -> &'static str {
        match self {
            Zone::Main => "SI",
            Zone::Zone2 => "Z2",
            Zone::Zone3 => "Z3",
        }
    }
}

/// Source of a secondary zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneSource {
    /// A regular input
    Input(InputSource),
    /// The zone reports no source of its own
    NoSource,
}

impl ZoneSource {
    pub fn label(self) -> &'static str {
        match self {
            ZoneSource::Input(source) => source.label(),
            ZoneSource::NoSource => "No Source",
        }
    }
}

impl fmt::Display for ZoneSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ZoneSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Receiver found on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub ip: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub serial: String,
}

impl DiscoveredDevice {
    /// Open a control session to this device on the default telnet port
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mdavr::discover;
    /// use std::net::{Ipv4Addr, SocketAddrV4};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ///     let group = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);
    ///     tokio::spawn(discover(group, move |device| {
    ///         let _ = tx.send(device);
    ///     }));
    ///
    ///     if let Some(device) = rx.recv().await {
    ///         let avr = device.connect().await?;
    ///         avr.turn_on()?;
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(&self) -> crate::error::Result<crate::client::AvrClient> {
        crate::client::AvrClient::connect(&self.name, &self.ip).await
    }
}
