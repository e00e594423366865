//! # Sensor Reader Module
//!
//! Oversampling quantizer over a raw ADC channel.
//!
//! Oversampling trades latency for resolution: `4^n` raw samples are summed
//! and the sum shifted right by `n`, yielding `n` extra bits of effective
//! precision. With a 10-bit ADC, one extra bit costs 4 samples, two extra
//! bits cost 16.

use std::fs;
use std::path::PathBuf;

use crate::error::{AgentError, Result};

/// Source of raw ADC samples.
///
/// Implementations read one conversion per call; the oversampling quantizer
/// drives the repetition.
pub trait AdcSource {
    /// Take one raw sample.
    fn sample(&mut self) -> Result<u16>;
}

impl<T: AdcSource + ?Sized> AdcSource for Box<T> {
    fn sample(&mut self) -> Result<u16> {
        (**self).sample()
    }
}

/// Number of extra resolution bits gained by oversampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversampleBits {
    /// Plain single read
    Zero,
    /// 4 samples, one extra bit
    One,
    /// 16 samples, two extra bits
    Two,
}

impl OversampleBits {
    /// Parse the configured bit count. Only 0, 1 and 2 are meaningful.
    pub fn from_config(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    fn shift(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Number of raw samples one reading consumes (`4^bits`).
    pub fn sample_count(self) -> u32 {
        1 << (self.shift() * 2)
    }
}

/// Take one oversampled reading.
///
/// Sums `4^bits` raw samples into a `u32` accumulator (a 16-bit sample
/// summed 16 times cannot overflow it) and shifts the sum right by `bits`.
/// Pure function of the sample sequence; no state survives the call.
///
/// The result lies in `[0, max_raw << bits]`.
pub fn read_oversampled<A: AdcSource>(adc: &mut A, bits: OversampleBits) -> Result<u32> {
    let mut sum: u32 = 0;
    for _ in 0..bits.sample_count() {
        sum += u32::from(adc.sample()?);
    }
    Ok(sum >> bits.shift())
}

/// ADC channel exposed through the Linux IIO sysfs interface.
///
/// Reads `/sys/bus/iio/devices/iio:device0/in_voltage<ch>_raw`, the standard
/// location for raw ADC conversions on boards with an IIO driver.
#[derive(Debug)]
pub struct IioAdc {
    path: PathBuf,
}

impl IioAdc {
    pub fn new(channel: u8) -> Self {
        Self {
            path: PathBuf::from(format!(
                "/sys/bus/iio/devices/iio:device0/in_voltage{channel}_raw"
            )),
        }
    }

    /// Build a reader over an explicit sysfs attribute path (used by tests
    /// and non-standard device numbering).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AdcSource for IioAdc {
    fn sample(&mut self) -> Result<u16> {
        let raw = fs::read_to_string(&self.path)?;
        raw.trim()
            .parse::<u16>()
            .map_err(|e| AgentError::Sensor(format!("bad IIO value {:?}: {}", raw.trim(), e)))
    }
}

/// Deterministic fallback source for deployments without an IIO channel.
///
/// Produces a slow triangle wave over the 10-bit range so downstream
/// dashboards show movement instead of a flat line.
#[derive(Debug, Default)]
pub struct SimulatedAdc {
    value: u16,
    rising: bool,
}

impl AdcSource for SimulatedAdc {
    fn sample(&mut self) -> Result<u16> {
        if self.rising {
            self.value += 1;
            if self.value >= 1023 {
                self.rising = false;
            }
        } else {
            self.value = self.value.saturating_sub(1);
            if self.value == 0 {
                self.rising = true;
            }
        }
        Ok(self.value)
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::ScriptedAdc;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_oversample_bits_from_config() {
        assert_eq!(OversampleBits::from_config(0), Some(OversampleBits::Zero));
        assert_eq!(OversampleBits::from_config(1), Some(OversampleBits::One));
        assert_eq!(OversampleBits::from_config(2), Some(OversampleBits::Two));
        assert_eq!(OversampleBits::from_config(3), None);
    }

    #[test]
    fn test_sample_counts() {
        assert_eq!(OversampleBits::Zero.sample_count(), 1);
        assert_eq!(OversampleBits::One.sample_count(), 4);
        assert_eq!(OversampleBits::Two.sample_count(), 16);
    }

    #[test]
    fn test_zero_bits_is_plain_read() {
        let mut adc = ScriptedAdc::new(vec![512]);
        let value = read_oversampled(&mut adc, OversampleBits::Zero).unwrap();
        assert_eq!(value, 512);
        assert_eq!(adc.samples_taken(), 1);
    }

    #[test]
    fn test_one_bit_oversampling_reference_values() {
        // sum 404 >> 1 = 202
        let mut adc = ScriptedAdc::new(vec![100, 102, 98, 104]);
        let value = read_oversampled(&mut adc, OversampleBits::One).unwrap();
        assert_eq!(value, 202);
        assert_eq!(adc.samples_taken(), 4);
    }

    #[test]
    fn test_two_bit_oversampling_takes_sixteen_samples() {
        let mut adc = ScriptedAdc::new(vec![100; 16]);
        let value = read_oversampled(&mut adc, OversampleBits::Two).unwrap();
        assert_eq!(value, (100 * 16) >> 2);
        assert_eq!(adc.samples_taken(), 16);
    }

    #[test]
    fn test_output_stays_within_widened_range() {
        // 10-bit full scale on every sample: output must not exceed
        // max_raw << bits.
        for (bits, shift) in [
            (OversampleBits::Zero, 0u32),
            (OversampleBits::One, 1),
            (OversampleBits::Two, 2),
        ] {
            let n = bits.sample_count() as usize;
            let mut adc = ScriptedAdc::new(vec![1023; n]);
            let value = read_oversampled(&mut adc, bits).unwrap();
            assert!(value <= 1023 << shift, "bits={bits:?} value={value}");
            assert_eq!(value, 1023 << shift);
        }
    }

    #[test]
    fn test_sample_error_propagates() {
        // Sequence shorter than the sample count
        let mut adc = ScriptedAdc::new(vec![10, 20]);
        let result = read_oversampled(&mut adc, OversampleBits::One);
        assert!(result.is_err());
    }

    #[test]
    fn test_iio_adc_reads_sysfs_attribute() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "731").unwrap();
        file.flush().unwrap();

        let mut adc = IioAdc::with_path(file.path());
        assert_eq!(adc.sample().unwrap(), 731);
    }

    #[test]
    fn test_iio_adc_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-a-number").unwrap();
        file.flush().unwrap();

        let mut adc = IioAdc::with_path(file.path());
        assert!(adc.sample().is_err());
    }

    #[test]
    fn test_simulated_adc_stays_in_ten_bit_range() {
        let mut adc = SimulatedAdc::default();
        for _ in 0..5000 {
            let v = adc.sample().unwrap();
            assert!(v <= 1023);
        }
    }
}
