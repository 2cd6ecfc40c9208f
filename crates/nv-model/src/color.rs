//! Surface colors and volume color maps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// An sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// White, the default surface color.
    pub const WHITE: Rgb = Rgb([0xff, 0xff, 0xff]);
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Rgb {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidValue {
            field: "color",
            reason: format!("'{}' is not a #rrggbb color", s),
        };

        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *channel = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(rgb))
    }
}

impl TryFrom<String> for Rgb {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// Color map applied to a volume.
///
/// The same map has three spellings: the backend code, the name the
/// rendering engine expects, and the label shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorMap {
    #[default]
    #[serde(rename = "gray")]
    Gray,
    #[serde(rename = "heat")]
    Heat,
    #[serde(rename = "LookupTable")]
    LookupTable,
}

impl ColorMap {
    /// All values.
    pub const ALL: [ColorMap; 3] = [Self::Gray, Self::Heat, Self::LookupTable];

    /// Code stored by the backend.
    pub fn backend_code(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Heat => "heat",
            Self::LookupTable => "LookupTable",
        }
    }

    /// Name understood by the rendering engine.
    pub fn engine_name(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Heat => "Hot",
            Self::LookupTable => "LookupTable",
        }
    }

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gray => "Gray",
            Self::Heat => "Heat",
            Self::LookupTable => "LookupTable",
        }
    }

    /// Parse a backend code.
    pub fn from_backend(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|map| map.backend_code() == code)
    }
}
