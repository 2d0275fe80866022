use std::{path::Path, time::Duration};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{error::Error, protocol::SLOT_COUNT};

/// The only kind of hub this crate knows how to talk to.
pub const SUPPORTED_HUB_TYPE: &str = "Mitutoyo";

/// One hub, as described by a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Which controller this entry belongs to.
    /// Starts at 1.
    pub index: u32,

    /// Must be [`SUPPORTED_HUB_TYPE`].
    pub hub_type: String,

    /// Where the hub is installed.
    pub location: String,

    /// The units positions are reported in.
    pub units: String,

    /// The path to the serial port.
    /// Likely "/dev/ttyUSBx" or "COMx".
    pub serial_port: String,

    /// Seconds between two polls of the hub.
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval: f64,

    /// The names of the devices plugged into the hub.
    /// The first name is slot 1, and so on.
    /// Slots beyond the end of this list are unused.
    pub devices: Vec<String>,
}

fn default_telemetry_interval() -> f64 {
    1.0
}

impl HubConfig {
    /// An example hub with a single gauge in slot 1.
    pub fn example() -> Self {
        Self {
            index: 1,
            hub_type: SUPPORTED_HUB_TYPE.into(),
            location: "Office".into(),
            units: "um".into(),
            serial_port: "/dev/ttyUSB0".into(),
            telemetry_interval: default_telemetry_interval(),
            devices: vec!["Dial Gage".into()],
        }
    }

    /// Time between two polls.
    pub fn telemetry_interval(&self) -> Result<Duration, Error> {
        Duration::try_from_secs_f64(self.telemetry_interval).map_err(|e| {
            Error::BadConfig(format!(
                "The hub with index {} has telemetry_interval {}, which is not a usable duration: {e}",
                self.index, self.telemetry_interval
            ))
        })
    }

    /// The name of each slot, empty where nothing is configured.
    pub fn slot_names(&self) -> [String; SLOT_COUNT] {
        std::array::from_fn(|index| self.devices.get(index).cloned().unwrap_or_default())
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let index = self.index;

        if index == 0 {
            return Err(Error::BadConfig(
                "Hub indices start at 1, found index 0".into(),
            ));
        }

        if self.hub_type != SUPPORTED_HUB_TYPE {
            return Err(Error::BadConfig(format!(
                "The hub with index {index} has hub_type `{}`, only `{SUPPORTED_HUB_TYPE}` is supported",
                self.hub_type
            )));
        }

        if !self.telemetry_interval.is_finite()
            || self.telemetry_interval <= 0.0
            || Duration::try_from_secs_f64(self.telemetry_interval).is_err()
        {
            return Err(Error::BadConfig(format!(
                "The hub with index {index} has telemetry_interval {}, it must be a positive number of seconds",
                self.telemetry_interval
            )));
        }

        if self.devices.len() > SLOT_COUNT {
            return Err(Error::BadConfig(format!(
                "The hub with index {index} lists {} devices, but only has {SLOT_COUNT} slots",
                self.devices.len()
            )));
        }

        if let Some(position) = self.devices.iter().position(|name| name.trim().is_empty()) {
            return Err(Error::BadConfig(format!(
                "The hub with index {index} has an empty device name for slot {}",
                position + 1
            )));
        }

        Ok(())
    }
}

/// The configuration used for running hub controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// The hubs which may be controlled.
    pub hub_config: Vec<HubConfig>,
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Could not parse configuration: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            hub_config: vec![HubConfig::example()],
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize configuration: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        Self::deserialize(&s)
    }

    /// The configuration of the hub with the given index.
    pub fn hub(&self, index: u32) -> Result<&HubConfig, Error> {
        self.hub_config
            .iter()
            .find(|hub| hub.index == index)
            .ok_or_else(|| {
                Error::BadConfig(format!(
                    "No hub with index {index}, known indices: {:?}",
                    self.hub_config.iter().map(|hub| hub.index).collect::<Vec<_>>()
                ))
            })
    }

    fn check_duplicate_indices(&self) -> Result<(), Error> {
        let duplicates = self
            .hub_config
            .iter()
            .map(|hub| hub.index)
            .duplicates()
            .collect::<Vec<_>>();

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "Each hub needs its own index. Duplicates: {duplicates:?}"
            )))
        }
    }

    /// Check that every hub entry is usable.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_duplicate_indices()?;

        for hub in &self.hub_config {
            hub.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn serialize() {
        let c = Config::example();

        println!("{}", c.serialize_pretty().unwrap());
    }

    #[test]
    fn example_round_trips_through_ron() {
        let c = Config::example();
        let back = Config::deserialize(&c.serialize_pretty().unwrap()).unwrap();

        assert_eq!(c, back);
    }

    #[test]
    fn deserialize() {
        let input = r#"
(
    hub_config: [
        (
            index: 1,
            hub_type: "Mitutoyo",
            location: "Office",
            units: "um",
            serial_port: "/dev/ttyUSB0",
            telemetry_interval: 0.5,
            devices: ["Dial Gage", "Second Gage"],
        ),
        (
            index: 2,
            hub_type: "Mitutoyo",
            location: "Lab",
            units: "mm",
            serial_port: "/dev/ttyUSB1",
            devices: [],
        ),
    ],
)
"#;
        let config = Config::deserialize(input).unwrap();
        config.validate().unwrap();

        let hub = config.hub(2).unwrap();
        assert_eq!(hub.telemetry_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(hub.location, "Lab");

        let hub = config.hub(1).unwrap();
        assert_eq!(hub.telemetry_interval().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn garbage_is_bad_config() {
        let err = Config::deserialize("(hub_config: 12)").unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn missing_hub() {
        let err = Config::example().hub(3).unwrap_err().try_into_bad_config().unwrap();
        assert!(err.contains("index 3"));
    }

    #[test]
    fn slot_names_pad_to_eight() {
        let names = HubConfig::example().slot_names();

        assert_eq!(names[0], "Dial Gage");
        assert!(names[1..].iter().all(String::is_empty));
    }

    fn bad(change: impl FnOnce(&mut HubConfig)) -> String {
        let mut hub = HubConfig::example();
        change(&mut hub);

        Config {
            hub_config: vec![hub],
        }
        .validate()
        .unwrap_err()
        .try_into_bad_config()
        .unwrap()
    }

    #[test]
    fn bad_config_hub_type() {
        let err = bad(|hub| hub.hub_type = "Sandwich".into());
        assert!(err.contains("Sandwich"));
    }

    #[test]
    fn bad_config_interval() {
        assert!(bad(|hub| hub.telemetry_interval = 0.0).contains("telemetry_interval"));
        assert!(bad(|hub| hub.telemetry_interval = -1.0).contains("telemetry_interval"));
        assert!(bad(|hub| hub.telemetry_interval = f64::NAN).contains("telemetry_interval"));
        assert!(bad(|hub| hub.telemetry_interval = 1e20).contains("telemetry_interval"));
    }

    #[test]
    fn oversized_interval_is_not_a_duration() {
        let mut hub = HubConfig::example();
        hub.telemetry_interval = 1e20;

        assert!(matches!(hub.telemetry_interval(), Err(Error::BadConfig(_))));
    }

    #[test]
    fn bad_config_too_many_devices() {
        let err = bad(|hub| hub.devices = (1..=9).map(|i| format!("Gage {i}")).collect());
        assert!(err.contains("9 devices"));
    }

    #[test]
    fn bad_config_empty_device_name() {
        let err = bad(|hub| hub.devices = vec!["Gage".into(), "".into()]);
        assert!(err.contains("slot 2"));
    }

    #[test]
    fn bad_config_index_zero() {
        assert!(bad(|hub| hub.index = 0).contains("index 0"));
    }

    #[test]
    fn bad_config_duplicates() {
        let c = Config {
            hub_config: vec![HubConfig::example(), HubConfig::example()],
        };

        let err = c.validate().unwrap_err().try_into_bad_config().unwrap();
        assert!(err.contains("Duplicates: [1]"));
    }
}
