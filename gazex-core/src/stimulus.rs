use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Aspect ratio held in hundredths, so `1.25` is stored as `125`.
///
/// Ratios travel through manifests and asset names as fixed two-decimal
/// strings; keeping them as integers makes equality and hashing exact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RatioRepr", into = "String")]
pub struct Ratio(u32);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatioParseError {
    #[error("ratio `{0}` is not a decimal number")]
    NotANumber(String),
    #[error("ratio {0} must be finite and greater than zero")]
    OutOfRange(f64),
    #[error("ratio `{0}` is finer than hundredths")]
    TooPrecise(String),
}

impl Ratio {
    /// The undistorted ratio every target carries unless a manifest says otherwise.
    pub const CANONICAL: Ratio = Ratio(100);

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn from_f64(value: f64) -> Result<Self, RatioParseError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(RatioParseError::OutOfRange(value));
        }
        let scaled = value * 100.0;
        let hundredths = scaled.round();
        if (scaled - hundredths).abs() > 1e-6 {
            return Err(RatioParseError::TooPrecise(value.to_string()));
        }
        if hundredths < 1.0 || hundredths > u32::MAX as f64 {
            return Err(RatioParseError::OutOfRange(value));
        }
        Ok(Self(hundredths as u32))
    }
}

impl FromStr for Ratio {
    type Err = RatioParseError;

    /// Accepts plain decimals with at most two significant fraction digits
    /// (`"1.5"`, `"1.25"`, `"1.250"`). Signed or exponent forms go through
    /// [`Ratio::from_f64`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            let value: f64 = text
                .parse()
                .map_err(|_| RatioParseError::NotANumber(s.to_string()))?;
            return Self::from_f64(value);
        }

        if fraction.len() > 2 && fraction[2..].bytes().any(|b| b != b'0') {
            return Err(RatioParseError::TooPrecise(s.to_string()));
        }
        let cents = format!("{:0<2}", &fraction[..fraction.len().min(2)]);
        let whole_value: u32 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| RatioParseError::NotANumber(s.to_string()))?
        };
        let hundredths = whole_value
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents.parse().unwrap_or(0)))
            .filter(|h| *h > 0)
            .ok_or(RatioParseError::OutOfRange(text.parse().unwrap_or(0.0)))?;
        Ok(Self(hundredths))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<Ratio> for String {
    fn from(ratio: Ratio) -> Self {
        ratio.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RatioRepr {
    Text(String),
    Number(f64),
}

impl TryFrom<RatioRepr> for Ratio {
    type Error = RatioParseError;

    fn try_from(repr: RatioRepr) -> Result<Self, Self::Error> {
        match repr {
            RatioRepr::Text(text) => text.parse(),
            RatioRepr::Number(value) => Ratio::from_f64(value),
        }
    }
}

/// One renderable stimulus: a shape drawn in a color at an aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stimulus {
    pub shape: String,
    pub color: String,
    pub ratio: Ratio,
}

impl Stimulus {
    pub fn new(shape: impl Into<String>, color: impl Into<String>, ratio: Ratio) -> Self {
        Self {
            shape: shape.into(),
            color: color.into(),
            ratio,
        }
    }

    /// File name of the stimulus image, `{shape}-{ratio}-{color}.{ext}`.
    pub fn asset_name(&self, extension: &str) -> String {
        format!("{}-{}-{}.{}", self.shape, self.ratio, self.color, extension)
    }
}

/// Screen slot a stimulus is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusPosition {
    Left,
    Center,
    Right,
}

impl StimulusPosition {
    pub const ALL: [StimulusPosition; 3] = [
        StimulusPosition::Left,
        StimulusPosition::Center,
        StimulusPosition::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusPosition::Left => "left",
            StimulusPosition::Center => "center",
            StimulusPosition::Right => "right",
        }
    }
}

impl fmt::Display for StimulusPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_formats_with_two_decimals() {
        assert_eq!(Ratio::CANONICAL.to_string(), "1.00");
        assert_eq!("1.5".parse::<Ratio>().unwrap().to_string(), "1.50");
        assert_eq!(Ratio::from_hundredths(205).to_string(), "2.05");
    }

    #[test]
    fn ratio_rejects_garbage() {
        assert!("wide".parse::<Ratio>().is_err());
        assert!("-1.0".parse::<Ratio>().is_err());
        assert!("0".parse::<Ratio>().is_err());
        assert!(Ratio::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn ratio_refuses_to_round_away_precision() {
        assert_eq!(
            "1.254".parse::<Ratio>(),
            Err(RatioParseError::TooPrecise("1.254".into()))
        );
        assert!("1.004".parse::<Ratio>().is_err());
        assert!(Ratio::from_f64(1.254).is_err());
        assert!(serde_json::from_str::<Ratio>("1.004").is_err());

        assert_eq!("1.250".parse::<Ratio>().unwrap(), Ratio::from_hundredths(125));
        assert_eq!("2".parse::<Ratio>().unwrap(), Ratio::from_hundredths(200));
        assert_eq!(".75".parse::<Ratio>().unwrap(), Ratio::from_hundredths(75));
        assert_eq!(Ratio::from_f64(1.1).unwrap(), Ratio::from_hundredths(110));
    }

    #[test]
    fn ratio_deserializes_from_text_or_number() {
        let from_text: Ratio = serde_json::from_str("\"1.25\"").unwrap();
        let from_number: Ratio = serde_json::from_str("1.25").unwrap();
        assert_eq!(from_text, from_number);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"1.25\"");
    }

    #[test]
    fn asset_names_follow_naming_convention() {
        let stim = Stimulus::new("circle", "red", Ratio::CANONICAL);
        assert_eq!(stim.asset_name("png"), "circle-1.00-red.png");
    }
}
