//! Signal allow-list and raw → engineering value conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::frame::{BusFrame, FrameError, FramePayload};

/// Decoding rule for one signal: `physical = offset + scale * raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub id: String,
    pub unit: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Bit position of the LSB inside the raw payload.
    #[serde(default)]
    pub start_bit: u16,
    #[serde(default = "default_length")]
    pub length: u16,
    #[serde(default)]
    pub signed: bool,
}

fn default_scale() -> f64 {
    1.0
}

fn default_length() -> u16 {
    16
}

impl SignalSpec {
    pub fn new(id: &str, unit: &str) -> Self {
        Self {
            id: id.to_string(),
            unit: unit.to_string(),
            scale: default_scale(),
            offset: 0.0,
            min: None,
            max: None,
            start_bit: 0,
            length: default_length(),
            signed: false,
        }
    }

    pub fn scaled(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn bits(mut self, start_bit: u16, length: u16, signed: bool) -> Self {
        self.start_bit = start_bit;
        self.length = length;
        self.signed = signed;
        self
    }

    /// Extracts the raw integer (Intel byte order) and applies scale/offset.
    pub fn decode_raw(&self, data: &[u8]) -> Result<f64, FrameError> {
        let start = self.start_bit as usize;
        let length = self.length as usize;
        if length == 0 || length > 64 {
            return Err(self.undecodable(format!("invalid bit length {}", length)));
        }
        let required_bytes = (start + length + 7) / 8;
        if required_bytes > data.len() {
            return Err(self.undecodable(format!(
                "needs {} bytes, frame has {}",
                required_bytes,
                data.len()
            )));
        }

        let mut raw: u64 = 0;
        for i in 0..length {
            let bit_pos = start + i;
            let bit = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            raw |= (bit as u64) << i;
        }

        let raw = if self.signed {
            sign_extend(raw, length) as f64
        } else {
            raw as f64
        };
        Ok(self.offset + self.scale * raw)
    }

    /// Inverse of [`SignalSpec::decode_raw`]; used by the simulator and tests.
    pub fn encode_raw(&self, physical: f64) -> Vec<u8> {
        let length = self.length.min(64) as usize;
        let raw = ((physical - self.offset) / self.scale).round() as i64;
        let bits = if length >= 64 { raw as u64 } else { (raw as u64) & ((1u64 << length) - 1) };

        let start = self.start_bit as usize;
        let mut data = vec![0u8; (start + length + 7) / 8];
        for i in 0..length {
            if (bits >> i) & 0x01 == 1 {
                let bit_pos = start + i;
                data[bit_pos / 8] |= 1 << (bit_pos % 8);
            }
        }
        data
    }

    fn check(&self, value: f64) -> Result<f64, FrameError> {
        if !value.is_finite() {
            return Err(FrameError::NonFinite {
                signal_id: self.id.clone(),
            });
        }
        let min = self.min.unwrap_or(f64::NEG_INFINITY);
        let max = self.max.unwrap_or(f64::INFINITY);
        if value < min || value > max {
            return Err(FrameError::OutOfRange {
                signal_id: self.id.clone(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    fn undecodable(&self, reason: String) -> FrameError {
        FrameError::Undecodable {
            signal_id: self.id.clone(),
            reason,
        }
    }
}

fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }
    let sign_bit = 1u64 << (bit_length - 1);
    if value & sign_bit != 0 {
        (value | (!0u64 << bit_length)) as i64
    } else {
        value as i64
    }
}

/// A frame that passed decoding and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<'a> {
    pub signal_id: &'a str,
    pub value: f64,
    pub unit: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    specs: HashMap<String, SignalSpec>,
    enforce_allow_list: bool,
}

impl SignalCatalog {
    pub fn new(specs: Vec<SignalSpec>, enforce_allow_list: bool) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.id.clone(), s)).collect(),
            enforce_allow_list,
        }
    }

    /// The three dashboard signals of the HMI.
    pub fn vehicle_default() -> Self {
        Self::new(default_specs(), true)
    }

    pub fn spec(&self, signal_id: &str) -> Option<&SignalSpec> {
        self.specs.get(signal_id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn enforces_allow_list(&self) -> bool {
        self.enforce_allow_list
    }

    pub fn decode<'a>(&'a self, frame: &'a BusFrame) -> Result<Decoded<'a>, FrameError> {
        match self.specs.get(&frame.signal_id) {
            Some(spec) => {
                let value = match &frame.payload {
                    FramePayload::Value(v) => *v,
                    FramePayload::Raw(bytes) => spec.decode_raw(bytes)?,
                };
                Ok(Decoded {
                    signal_id: &spec.id,
                    value: spec.check(value)?,
                    unit: &spec.unit,
                })
            }
            None if self.enforce_allow_list => Err(FrameError::UnknownSignal(frame.signal_id.clone())),
            None => match &frame.payload {
                FramePayload::Value(v) if v.is_finite() => Ok(Decoded {
                    signal_id: &frame.signal_id,
                    value: *v,
                    unit: frame.unit.as_deref().unwrap_or(""),
                }),
                FramePayload::Value(_) => Err(FrameError::NonFinite {
                    signal_id: frame.signal_id.clone(),
                }),
                FramePayload::Raw(_) => Err(FrameError::Undecodable {
                    signal_id: frame.signal_id.clone(),
                    reason: "raw payload for uncatalogued signal".to_string(),
                }),
            },
        }
    }
}

pub fn default_specs() -> Vec<SignalSpec> {
    vec![
        SignalSpec::new("speed", "km/h").scaled(0.01, 0.0).range(0.0, 250.0),
        SignalSpec::new("battery_voltage", "V").scaled(0.001, 0.0).range(0.0, 60.0),
        SignalSpec::new("motor_temp", "°C").scaled(0.1, 0.0).bits(0, 16, true).range(-40.0, 200.0),
    ]
}
