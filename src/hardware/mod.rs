// Hardware adapters behind the Adc/Gpio ports. The simulator is always
// available; the Raspberry Pi adapters need the `hardware` feature.

#[cfg(feature = "hardware")]
pub mod rpi;
pub mod sim;
