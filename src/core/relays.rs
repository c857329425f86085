use crate::domain::model::{Level, RelayLayout, RelayState};
use crate::domain::ports::Gpio;
use crate::utils::error::{CompressorError, Result};
use std::collections::HashMap;

/// Channel names used by the compressor.
pub const INLET: &str = "inlet";
pub const OUTLET: &str = "outlet";

#[derive(Debug, Clone)]
struct Relay {
    pin: u8,
    off_level: Level,
    state: RelayState,
}

/// Named relay channels behind a GPIO port. Each channel carries its own
/// off-level so active-low boards and N.C./N.O. valves wire up the same way.
pub struct RelayBank<G: Gpio> {
    gpio: G,
    channels: HashMap<String, Relay>,
    max_channels: usize,
}

impl<G: Gpio> RelayBank<G> {
    pub fn new(gpio: G, max_channels: usize) -> Self {
        Self {
            gpio,
            channels: HashMap::new(),
            max_channels,
        }
    }

    pub fn from_layout(gpio: G, layout: &RelayLayout) -> Result<Self> {
        let mut bank = Self::new(gpio, layout.max_channels);
        bank.register(INLET, layout.inlet.pin, layout.inlet.off_level)?;
        bank.register(OUTLET, layout.outlet.pin, layout.outlet.off_level)?;
        bank.init()?;
        Ok(bank)
    }

    pub fn register(&mut self, name: &str, pin: u8, off_level: Level) -> Result<()> {
        if self.channels.len() >= self.max_channels {
            return Err(CompressorError::MaxChannelsError {
                limit: self.max_channels,
            });
        }

        self.gpio.setup_output(pin)?;
        self.channels.insert(
            name.to_string(),
            Relay {
                pin,
                off_level,
                state: RelayState::Off,
            },
        );
        Ok(())
    }

    /// Drive every registered channel to its off-level. Run once after
    /// registration so the pins start in a known state.
    pub fn init(&mut self) -> Result<()> {
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            self.set_off(&name)?;
        }
        Ok(())
    }

    pub fn set_on(&mut self, name: &str) -> Result<()> {
        let relay = Self::get_mut(&mut self.channels, name)?;
        let level = relay.off_level.invert();
        let pin = relay.pin;
        relay.state = RelayState::On;
        self.gpio.write(pin, level)?;
        tracing::trace!("Relay '{}' on (pin {} -> {:?})", name, pin, level);
        Ok(())
    }

    pub fn set_off(&mut self, name: &str) -> Result<()> {
        let relay = Self::get_mut(&mut self.channels, name)?;
        let level = relay.off_level;
        let pin = relay.pin;
        relay.state = RelayState::Off;
        self.gpio.write(pin, level)?;
        tracing::trace!("Relay '{}' off (pin {} -> {:?})", name, pin, level);
        Ok(())
    }

    pub fn is_on(&self, name: &str) -> Result<bool> {
        let relay = self
            .channels
            .get(name)
            .ok_or_else(|| CompressorError::UnknownRelayError {
                name: name.to_string(),
            })?;
        Ok(relay.state == RelayState::On)
    }

    pub fn all_off(&mut self) -> Result<()> {
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            self.set_off(&name)?;
        }
        Ok(())
    }

    fn get_mut<'a>(channels: &'a mut HashMap<String, Relay>, name: &str) -> Result<&'a mut Relay> {
        channels
            .get_mut(name)
            .ok_or_else(|| CompressorError::UnknownRelayError {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingGpio {
        writes: Arc<Mutex<Vec<(u8, Level)>>>,
    }

    impl Gpio for RecordingGpio {
        fn setup_output(&mut self, _pin: u8) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, pin: u8, level: Level) -> Result<()> {
            self.writes.lock().unwrap().push((pin, level));
            Ok(())
        }
    }

    #[test]
    fn test_active_low_relay_levels() {
        let gpio = RecordingGpio::default();
        let writes = gpio.writes.clone();

        let mut bank = RelayBank::new(gpio, 4);
        bank.register("inlet", 17, Level::High).unwrap();

        bank.set_on("inlet").unwrap();
        bank.set_off("inlet").unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(*writes, vec![(17, Level::Low), (17, Level::High)]);
    }

    #[test]
    fn test_init_drives_every_channel_off() {
        let gpio = RecordingGpio::default();
        let writes = gpio.writes.clone();

        let mut bank = RelayBank::new(gpio, 4);
        bank.register("inlet", 17, Level::High).unwrap();
        bank.register("outlet", 27, Level::Low).unwrap();
        bank.init().unwrap();

        let mut seen: Vec<(u8, Level)> = writes.lock().unwrap().clone();
        seen.sort_by_key(|(pin, _)| *pin);
        assert_eq!(seen, vec![(17, Level::High), (27, Level::Low)]);
        assert!(!bank.is_on("inlet").unwrap());
        assert!(!bank.is_on("outlet").unwrap());
    }

    #[test]
    fn test_register_respects_channel_limit() {
        let mut bank = RelayBank::new(RecordingGpio::default(), 2);
        bank.register("a", 1, Level::Low).unwrap();
        bank.register("b", 2, Level::Low).unwrap();

        let err = bank.register("c", 3, Level::Low).unwrap_err();
        assert!(matches!(err, CompressorError::MaxChannelsError { limit: 2 }));
    }

    #[test]
    fn test_unknown_channel_is_an_error() {
        let mut bank = RelayBank::new(RecordingGpio::default(), 4);
        assert!(matches!(
            bank.set_on("pump"),
            Err(CompressorError::UnknownRelayError { .. })
        ));
        assert!(bank.is_on("pump").is_err());
    }

    #[test]
    fn test_state_tracks_switching() {
        let mut bank = RelayBank::new(RecordingGpio::default(), 4);
        bank.register("outlet", 27, Level::Low).unwrap();

        assert!(!bank.is_on("outlet").unwrap());
        bank.set_on("outlet").unwrap();
        assert!(bank.is_on("outlet").unwrap());
        bank.all_off().unwrap();
        assert!(!bank.is_on("outlet").unwrap());
    }
}
