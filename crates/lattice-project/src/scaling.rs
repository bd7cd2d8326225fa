//! Raw/engineering-unit value scaling for tags.

use lattice_ua::{Scalar, VariantType};
use serde::{Deserialize, Serialize};

use crate::error::{FieldErrors, ProjectError, ProjectResult};

/// How a raw value maps onto its scaled range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScalingMode {
    /// Values pass through unchanged.
    #[default]
    None,
    /// Linear interpolation between the raw and scaled ranges.
    Linear,
    /// Square-root interpolation.
    SquareRoot,
}

impl ScalingMode {
    /// Parses the persisted mode name.
    pub fn parse(value: &str) -> ProjectResult<Self> {
        match value {
            "None" => Ok(ScalingMode::None),
            "Linear" => Ok(ScalingMode::Linear),
            "Square root" => Ok(ScalingMode::SquareRoot),
            _ => Err(ProjectError::InvalidValue),
        }
    }

    /// The persisted mode name.
    pub const fn name(self) -> &'static str {
        match self {
            ScalingMode::None => "None",
            ScalingMode::Linear => "Linear",
            ScalingMode::SquareRoot => "Square root",
        }
    }
}

/// The parameter block of one scaled tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    /// The mode.
    pub mode: ScalingMode,
    /// Lower bound of the raw range.
    pub raw_low: f64,
    /// Upper bound of the raw range.
    pub raw_high: f64,
    /// Lower bound of the scaled range.
    pub scaled_low: f64,
    /// Upper bound of the scaled range.
    pub scaled_high: f64,
    /// Clamp results below the scaled low bound.
    pub clamp_low: bool,
    /// Clamp results above the scaled high bound.
    pub clamp_high: bool,
    /// Negate the scaled value.
    pub negate: bool,
    /// The data type scaled values are converted to.
    pub scaled_type: VariantType,
}

impl Scaling {
    /// The read-direction scale factor.
    pub fn read_factor(&self) -> f64 {
        match self.mode {
            ScalingMode::Linear => {
                (self.scaled_high - self.scaled_low) / (self.raw_high - self.raw_low)
            }
            ScalingMode::SquareRoot => {
                (self.scaled_high - self.scaled_low) / (self.raw_high - self.raw_low).sqrt()
            }
            ScalingMode::None => 1.0,
        }
    }

    /// The write-direction scale factor.
    pub fn write_factor(&self) -> f64 {
        match self.mode {
            ScalingMode::Linear => {
                (self.raw_high - self.raw_low) / (self.scaled_high - self.scaled_low)
            }
            ScalingMode::SquareRoot => {
                (self.raw_high - self.raw_low) / (self.scaled_high - self.scaled_low).powi(2)
            }
            ScalingMode::None => 1.0,
        }
    }

    /// Scales a raw value read from a device into the scaled range.
    pub fn read_scale(&self, value: &Scalar) -> ProjectResult<Scalar> {
        if matches!(value, Scalar::Null) {
            return Err(ProjectError::InvalidValue);
        }
        if self.mode == ScalingMode::None {
            return Ok(value.clone());
        }
        let raw = value.as_f64().ok_or(ProjectError::InvalidValue)?;
        let factor = self.read_factor();
        let mut scaled = match self.mode {
            ScalingMode::Linear => (raw - self.raw_low) * factor + self.scaled_low,
            ScalingMode::SquareRoot => (raw - self.raw_low).sqrt() * factor + self.scaled_low,
            ScalingMode::None => unreachable!(),
        };
        scaled = self.clamp(scaled);
        if self.negate {
            scaled = -scaled;
        }
        convert_to(self.scaled_type, scaled)
    }

    /// Scales a value written by a client back into the raw range.
    ///
    /// The square-root branch squares `(value - scaled_low)`: it is the
    /// defined inverse of the read-side sqrt.
    pub fn write_scale(&self, value: &Scalar) -> ProjectResult<Scalar> {
        if matches!(value, Scalar::Null) {
            return Err(ProjectError::InvalidValue);
        }
        if self.mode == ScalingMode::None {
            return Ok(value.clone());
        }
        let mut v = value.as_f64().ok_or(ProjectError::InvalidValue)?;
        if self.negate {
            v = -v;
        }
        v = self.clamp(v);
        let factor = self.write_factor();
        let raw = match self.mode {
            ScalingMode::Linear => (v - self.scaled_low) * factor + self.raw_low,
            ScalingMode::SquareRoot => (v - self.scaled_low).powi(2) * factor + self.raw_low,
            ScalingMode::None => unreachable!(),
        };
        convert_to(self.scaled_type, raw)
    }

    fn clamp(&self, mut value: f64) -> f64 {
        if self.clamp_low && value < self.scaled_low {
            value = self.scaled_low;
        }
        if self.clamp_high && value > self.scaled_high {
            value = self.scaled_high;
        }
        value
    }
}

fn convert_to(target: VariantType, value: f64) -> ProjectResult<Scalar> {
    fn int<T: TryFrom<i64>>(value: f64) -> ProjectResult<T> {
        let rounded = value.round();
        if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
            return Err(ProjectError::ValueOutOfRange);
        }
        T::try_from(rounded as i64).map_err(|_| ProjectError::ValueOutOfRange)
    }
    Ok(match target {
        VariantType::SByte => Scalar::SByte(int(value)?),
        VariantType::Byte => Scalar::Byte(int(value)?),
        VariantType::Int16 => Scalar::Int16(int(value)?),
        VariantType::UInt16 => Scalar::UInt16(int(value)?),
        VariantType::Int32 => Scalar::Int32(int(value)?),
        VariantType::UInt32 => Scalar::UInt32(int(value)?),
        VariantType::Int64 => Scalar::Int64(int(value)?),
        VariantType::UInt64 => {
            if value < 0.0 {
                return Err(ProjectError::ValueOutOfRange);
            }
            Scalar::UInt64(value.round() as u64)
        }
        VariantType::Float => Scalar::Float(value as f32),
        VariantType::Double => Scalar::Double(value),
        _ => return Err(ProjectError::InvalidValue),
    })
}

/// Validates the scaling bounds of a tag, returning one error per bad
/// field.
pub fn validate_scaling(
    raw_low: f64,
    raw_high: f64,
    scaled_low: f64,
    scaled_high: f64,
    scaled_type: VariantType,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if raw_low < 0.0 {
        errors.insert(
            "RawLow".to_string(),
            ProjectError::validation("raw low is out of range"),
        );
    }
    if raw_high <= raw_low {
        errors.insert(
            "RawLow".to_string(),
            ProjectError::validation("raw low must be smaller than raw high"),
        );
        errors.insert(
            "RawHigh".to_string(),
            ProjectError::validation("raw high must be greater than raw low"),
        );
    }
    if scaled_high <= scaled_low {
        errors.insert(
            "ScaledLow".to_string(),
            ProjectError::validation("scaled low must be smaller than scaled high"),
        );
        errors.insert(
            "ScaledHigh".to_string(),
            ProjectError::validation("scaled high must be greater than scaled low"),
        );
    }
    if convert_to(scaled_type, scaled_high).is_err() || convert_to(scaled_type, scaled_low).is_err()
    {
        errors.insert(
            "ScaledDataType".to_string(),
            ProjectError::validation("scaled data type cannot hold the scaled range"),
        );
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> Scaling {
        Scaling {
            mode: ScalingMode::Linear,
            raw_low: 0.0,
            raw_high: 4096.0,
            scaled_low: 0.0,
            scaled_high: 100.0,
            clamp_low: false,
            clamp_high: false,
            negate: false,
            scaled_type: VariantType::Double,
        }
    }

    #[test]
    fn linear_read_and_write_invert() {
        let s = linear();
        let scaled = s.read_scale(&Scalar::Double(2048.0)).unwrap();
        assert_eq!(scaled, Scalar::Double(50.0));
        let raw = s.write_scale(&scaled).unwrap();
        assert_eq!(raw, Scalar::Double(2048.0));
    }

    #[test]
    fn square_root_write_squares_the_offset() {
        let mut s = linear();
        s.mode = ScalingMode::SquareRoot;
        // read: sqrt(raw - rawLow) * factor + scaledLow
        let scaled = s.read_scale(&Scalar::Double(1024.0)).unwrap();
        let Scalar::Double(v) = scaled else { panic!() };
        assert!((v - 50.0).abs() < 1e-9);
        // write inverts bit-for-bit
        let raw = s.write_scale(&Scalar::Double(v)).unwrap();
        let Scalar::Double(r) = raw else { panic!() };
        assert!((r - 1024.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_and_negate() {
        let mut s = linear();
        s.clamp_high = true;
        let scaled = s.read_scale(&Scalar::Double(8192.0)).unwrap();
        assert_eq!(scaled, Scalar::Double(100.0));

        s.clamp_high = false;
        s.negate = true;
        let scaled = s.read_scale(&Scalar::Double(2048.0)).unwrap();
        assert_eq!(scaled, Scalar::Double(-50.0));
    }

    #[test]
    fn integer_target_rounds() {
        let mut s = linear();
        s.scaled_type = VariantType::Int16;
        let scaled = s.read_scale(&Scalar::Double(2047.0)).unwrap();
        assert_eq!(scaled, Scalar::Int16(50));
    }

    #[test]
    fn none_mode_passes_through() {
        let mut s = linear();
        s.mode = ScalingMode::None;
        let v = Scalar::String("raw".to_string());
        assert_eq!(s.read_scale(&v).unwrap(), v);
        assert!(s.read_scale(&Scalar::Null).is_err());
    }

    #[test]
    fn bounds_validation() {
        let errors = validate_scaling(-1.0, 100.0, 0.0, 50.0, VariantType::Double);
        assert!(errors.contains_key("RawLow"));

        let errors = validate_scaling(0.0, 0.0, 0.0, 50.0, VariantType::Double);
        assert!(errors.contains_key("RawHigh"));

        let errors = validate_scaling(0.0, 100.0, 50.0, 50.0, VariantType::Double);
        assert!(errors.contains_key("ScaledHigh"));

        let errors = validate_scaling(0.0, 100.0, 0.0, 500.0, VariantType::SByte);
        assert!(errors.contains_key("ScaledDataType"));

        assert!(validate_scaling(0.0, 4096.0, 0.0, 100.0, VariantType::Double).is_empty());
    }
}
