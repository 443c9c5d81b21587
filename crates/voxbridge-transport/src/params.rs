//! Connection parameters and client version signs

use std::fmt;
use std::str::FromStr;

use voxbridge_core::BridgeError;
use voxbridge_crypto::Identity;

/// Client platform announced to the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "OS X",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }
}

impl FromStr for Platform {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" | "osx" | "os x" => Ok(Platform::MacOs),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(BridgeError::InvalidVersionSign(format!(
                "unknown platform '{}'",
                other
            ))),
        }
    }
}

/// Signed client version the server checks on connect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionSign {
    pub build: String,
    pub platform: Platform,
    pub sign: String,
}

impl VersionSign {
    pub const DEFAULT_BUILD: &'static str = "3.0.19.4 [Build: 1468491418]";

    pub fn new(build: impl Into<String>, platform: Platform, sign: impl Into<String>) -> Self {
        VersionSign {
            build: build.into(),
            platform,
            sign: sign.into(),
        }
    }

    /// Parse the configured `build|platform|sign` form; empty means default
    pub fn from_config(value: &str) -> Result<Self, BridgeError> {
        if value.trim().is_empty() {
            Ok(Self::default())
        } else {
            value.parse()
        }
    }
}

impl Default for VersionSign {
    fn default() -> Self {
        VersionSign::new(Self::DEFAULT_BUILD, Platform::Linux, "")
    }
}

impl FromStr for VersionSign {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').map(str::trim).collect();
        let [build, platform, sign] = parts.as_slice() else {
            return Err(BridgeError::InvalidVersionSign(format!(
                "expected 'build|platform|sign', got '{}'",
                s
            )));
        };
        if build.is_empty() {
            return Err(BridgeError::InvalidVersionSign("empty build".to_string()));
        }
        Ok(VersionSign::new(*build, platform.parse()?, *sign))
    }
}

impl fmt::Display for VersionSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.build, self.platform.as_str())
    }
}

/// Everything the protocol client needs to establish a connection
#[derive(Clone, Debug)]
pub struct ConnectionParams {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub identity: Identity,
    pub is_password_hashed: bool,
    pub version_sign: VersionSign,
    /// Message shown to others when the client leaves
    pub quit_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_sign() {
        let sign: VersionSign = "3.1.6 [Build: 1502873983] | linux | o+l92HKfiUF+THx2rBsuNjj/S1QpxG1fd5o3Q7qtWxkviR3LI3JeWyc26eTmoQoMTgI3jjHV7dCwHsK1BVu6Aw=="
            .parse()
            .unwrap();
        assert_eq!(sign.build, "3.1.6 [Build: 1502873983]");
        assert_eq!(sign.platform, Platform::Linux);
        assert!(sign.sign.ends_with("Aw=="));
    }

    #[test]
    fn test_platform_case_insensitive() {
        assert_eq!("WINDOWS".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!(" Android ".parse::<Platform>().unwrap(), Platform::Android);
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn test_malformed_version_sign() {
        assert!(matches!(
            "3.0.0|linux".parse::<VersionSign>(),
            Err(BridgeError::InvalidVersionSign(_))
        ));
        assert!(matches!(
            " |linux|abc".parse::<VersionSign>(),
            Err(BridgeError::InvalidVersionSign(_))
        ));
    }

    #[test]
    fn test_empty_config_uses_default() {
        let sign = VersionSign::from_config("  ").unwrap();
        assert_eq!(sign, VersionSign::default());
        assert_eq!(sign.platform, Platform::Linux);
    }
}
