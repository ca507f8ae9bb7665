use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default connect/read timeout for a channel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(TransportError::InvalidConfig(format!(
                "data bits must be 5-8, got {other}"
            ))),
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(value: DataBits) -> Self {
        match value {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(TransportError::InvalidConfig(format!(
                "stop bits must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(value: StopBits) -> Self {
        match value {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl FromStr for Parity {
    type Err = TransportError;

    /// Accepts the single-letter forms (`N`, `O`, `E`) as well as the full names.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(Self::None),
            "o" | "odd" => Ok(Self::Odd),
            "e" | "even" => Ok(Self::Even),
            other => Err(TransportError::InvalidConfig(format!(
                "unknown parity: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Parity::None => "N",
            Parity::Odd => "O",
            Parity::Even => "E",
        };
        f.write_str(letter)
    }
}

impl From<Parity> for serialport::Parity {
    fn from(value: Parity) -> Self {
        match value {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Line parameters for a channel. Fixed once the channel is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Device path or other connector-specific address.
    pub address: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Applied to connect and to every read/write.
    pub timeout: Duration,
}

impl TransportConfig {
    /// 8N1 at `baud_rate` with the default timeout.
    pub fn new(address: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            address: address.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Short `9600 8N1` style description for diagnostics.
    pub fn line_settings(&self) -> String {
        let data = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        format!("{} {data}{}{stop}", self.baud_rate, self.parity)
    }
}

/// Outbound and inbound frame terminators for one channel.
///
/// `tx` is appended to every command written; `rx` marks the end of a
/// response. They may differ and may be several characters long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatorPair {
    tx: String,
    rx: String,
}

impl TerminatorPair {
    /// Both terminators must be non-empty.
    pub fn new(tx: impl Into<String>, rx: impl Into<String>) -> Result<Self> {
        let tx = tx.into();
        let rx = rx.into();
        if tx.is_empty() {
            return Err(TransportError::EmptyTerminator("tx"));
        }
        if rx.is_empty() {
            return Err(TransportError::EmptyTerminator("rx"));
        }
        Ok(Self { tx, rx })
    }

    pub fn tx(&self) -> &str {
        &self.tx
    }

    pub fn rx(&self) -> &str {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_accepts_letters_and_names() {
        assert_eq!("N".parse::<Parity>().unwrap(), Parity::None);
        assert_eq!("odd".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!(" E ".parse::<Parity>().unwrap(), Parity::Even);
        assert!("mark".parse::<Parity>().is_err());
    }

    #[test]
    fn data_and_stop_bits_reject_out_of_range() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert!(DataBits::try_from(9).is_err());
        assert_eq!(StopBits::try_from(2).unwrap(), StopBits::Two);
        assert!(StopBits::try_from(0).is_err());
    }

    #[test]
    fn line_settings_formats_8n1() {
        let config = TransportConfig::new("/dev/ttyUSB0", 9600);
        assert_eq!(config.line_settings(), "9600 8N1");

        let config = config
            .with_data_bits(DataBits::Seven)
            .with_parity(Parity::Even)
            .with_stop_bits(StopBits::Two);
        assert_eq!(config.line_settings(), "9600 7E2");
    }

    #[test]
    fn terminators_must_not_be_empty() {
        assert!(matches!(
            TerminatorPair::new("", "\r\n"),
            Err(TransportError::EmptyTerminator("tx"))
        ));
        assert!(matches!(
            TerminatorPair::new("\n", ""),
            Err(TransportError::EmptyTerminator("rx"))
        ));

        let pair = TerminatorPair::new("\n", "\r\n").unwrap();
        assert_eq!(pair.tx(), "\n");
        assert_eq!(pair.rx(), "\r\n");
    }
}
