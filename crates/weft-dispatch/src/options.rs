//! Typed option tables for the management methods.
//!
//! Clients pass options as string-keyed variants; each method recognizes a
//! fixed set of names. Parsing validates names, types, and ranges in one
//! pass — an unknown name, a wrongly-typed value, or an out-of-range value
//! fails the whole request before any state is touched.

use weft_core::{DeviceUuid, ManagerError, NetKeyIndex, NppiMode, UnicastAddress, MAX_KEY_INDEX};

/// A decoded option value from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// 16-bit unsigned value.
    U16(u16),
    /// Single byte.
    Byte(u8),
    /// Byte array.
    Bytes(Vec<u8>),
}

const INVALID: ManagerError = ManagerError::InvalidArguments("invalid options");

fn as_u16(value: &OptionValue) -> Result<u16, ManagerError> {
    match value {
        OptionValue::U16(v) => Ok(*v),
        _ => Err(INVALID),
    }
}

fn as_byte(value: &OptionValue) -> Result<u8, ManagerError> {
    match value {
        OptionValue::Byte(v) => Ok(*v),
        _ => Err(INVALID),
    }
}

fn as_bytes(value: &OptionValue) -> Result<&[u8], ManagerError> {
    match value {
        OptionValue::Bytes(v) => Ok(v),
        _ => Err(INVALID),
    }
}

fn parse_subnet(value: &OptionValue) -> Result<NetKeyIndex, ManagerError> {
    let raw = as_u16(value)?;
    if raw > MAX_KEY_INDEX {
        return Err(INVALID);
    }
    NetKeyIndex::new(raw).ok_or(INVALID)
}

/// A `Server` option: zero stands for "unset, use the local radio".
fn parse_server(value: &OptionValue) -> Result<Option<UnicastAddress>, ManagerError> {
    let raw = as_u16(value)?;
    if raw == 0 {
        return Ok(None);
    }
    UnicastAddress::new(raw).map(Some).ok_or(INVALID)
}

/// Options recognized by `AddNode`: `Seconds`, `Server`, `Subnet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddNodeOptions {
    /// Engine timeout override; `None` means the 60-second default.
    pub seconds: Option<u16>,
    /// Remote provisioning server.
    pub server: Option<UnicastAddress>,
    /// Subnet override; `None` means the node's primary.
    pub net_index: Option<NetKeyIndex>,
}

impl AddNodeOptions {
    /// Parse and validate the option pairs.
    pub fn parse(pairs: &[(String, OptionValue)]) -> Result<Self, ManagerError> {
        let mut options = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "Seconds" => options.seconds = Some(as_u16(value)?),
                "Server" => options.server = parse_server(value)?,
                "Subnet" => options.net_index = Some(parse_subnet(value)?),
                _ => return Err(INVALID),
            }
        }
        Ok(options)
    }
}

/// Options recognized by `Reprovision`: `NPPI`, `Subnet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReprovisionOptions {
    /// Sub-mode; `None` means a device-key refresh.
    pub mode: Option<NppiMode>,
    /// Subnet override.
    pub net_index: Option<NetKeyIndex>,
}

impl ReprovisionOptions {
    /// Parse and validate the option pairs.
    pub fn parse(pairs: &[(String, OptionValue)]) -> Result<Self, ManagerError> {
        let mut options = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "NPPI" => {
                    options.mode = Some(NppiMode::from_byte(as_byte(value)?).ok_or(INVALID)?);
                }
                "Subnet" => options.net_index = Some(parse_subnet(value)?),
                _ => return Err(INVALID),
            }
        }
        Ok(options)
    }
}

/// Options recognized by `UnprovisionedScan`: `Seconds`, `Subnet`,
/// `Server`, `Filter`, `Extended`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Scan duration.
    pub seconds: Option<u16>,
    /// Subnet used to reach a remote server.
    pub net_index: Option<NetKeyIndex>,
    /// Remote scan server.
    pub server: Option<UnicastAddress>,
    /// 16-byte device-UUID filter.
    pub filter: Option<DeviceUuid>,
    /// Opaque extended-scan data.
    pub extended: Option<Vec<u8>>,
}

impl ScanOptions {
    /// Parse and validate the option pairs.
    pub fn parse(pairs: &[(String, OptionValue)]) -> Result<Self, ManagerError> {
        let mut options = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "Seconds" => options.seconds = Some(as_u16(value)?),
                "Subnet" => options.net_index = Some(parse_subnet(value)?),
                "Server" => options.server = parse_server(value)?,
                "Filter" => {
                    let bytes = as_bytes(value)?;
                    options.filter =
                        Some(DeviceUuid::from_slice(bytes).map_err(|_| INVALID)?);
                }
                "Extended" => options.extended = Some(as_bytes(value)?.to_vec()),
                _ => return Err(INVALID),
            }
        }
        Ok(options)
    }
}
