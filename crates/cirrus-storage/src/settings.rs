use cirrus_core::{CirrusConfig, KeyStyle};

/// Scheme served by the object-store adapter unless configured otherwise
pub const DEFAULT_SCHEME: &str = "s3";

/// Object-store adapter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub schemes: Vec<String>,
    pub key_style: KeyStyle,
    /// Merge new properties into the existing metadata instead of replacing it
    pub merge_properties: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            schemes: vec![DEFAULT_SCHEME.to_string()],
            key_style: KeyStyle::default(),
            merge_properties: true,
        }
    }
}

impl StorageSettings {
    pub fn with_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key_style(mut self, key_style: KeyStyle) -> Self {
        self.key_style = key_style;
        self
    }

    pub fn with_merge_properties(mut self, merge: bool) -> Self {
        self.merge_properties = merge;
        self
    }
}

impl From<&CirrusConfig> for StorageSettings {
    fn from(config: &CirrusConfig) -> Self {
        Self {
            key_style: config.key_style,
            merge_properties: config.merge_properties,
            ..Default::default()
        }
    }
}
