//! Monetary amount helpers
//!
//! The API transmits amounts as decimal strings and some numeric fields
//! (e.g. `savings_goal_progress`) as either numbers or strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An amount as the API represents it: decimal string plus ISO currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

impl Amount {
    /// Create an amount rounded to two decimals
    pub fn new(value: f64, currency: impl Into<String>) -> Self {
        Self {
            value: format!("{:.2}", value),
            currency: currency.into(),
        }
    }

    /// Numeric value; 0.0 when the string does not parse
    pub fn as_f64(&self) -> f64 {
        self.value.parse().unwrap_or(0.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// An `f64` that deserializes from a JSON number, a numeric string or `null`
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct FlexFloat(pub f64);

impl From<FlexFloat> for f64 {
    fn from(value: FlexFloat) -> Self {
        value.0
    }
}

impl Serialize for FlexFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for FlexFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Self(0.0)),
            Some(Raw::Number(n)) => Ok(Self(n)),
            Some(Raw::Text(s)) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("FlexFloat: cannot parse {s:?}"))),
        }
    }
}
