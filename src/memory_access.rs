use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// One line of a replay trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAccess {
    Regular(MemRecord),
    Invalidate(InvalidateRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRecord {
    pub insn_count: u64,
    pub address: u64,
    pub store: bool,
    // stored word; loads carry none
    pub data: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidateRecord {
    pub insn_count: u64,
    pub address: u64,
}

impl MemoryAccess {
    pub fn insn_count(&self) -> u64 {
        match self {
            MemoryAccess::Regular(rec) => rec.insn_count,
            MemoryAccess::Invalidate(rec) => rec.insn_count,
        }
    }

    pub fn address(&self) -> u64 {
        match self {
            MemoryAccess::Regular(rec) => rec.address,
            MemoryAccess::Invalidate(rec) => rec.address,
        }
    }
}

impl fmt::Display for MemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.store, self.data) {
            (true, Some(data)) => write!(
                f,
                "{},-1,0x{:016x},0x{:08x}",
                self.insn_count, self.address, data
            ),
            (true, None) => write!(f, "{},-1,0x{:016x}", self.insn_count, self.address),
            (false, _) => write!(f, "{},0x{:016x}", self.insn_count, self.address),
        }
    }
}

impl fmt::Display for InvalidateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},inv,0x{:016x}", self.insn_count, self.address)
    }
}

impl fmt::Display for MemoryAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryAccess::Regular(rec) => fmt::Display::fmt(rec, f),
            MemoryAccess::Invalidate(rec) => fmt::Display::fmt(rec, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidFormat(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidFormat(line) => write!(f, "malformed trace record: {line:?}"),
        }
    }
}

impl Error for ParseError {}

// insn count, optional "-1" (store) or "inv" marker, address, optional store data
static TRACE_RECORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\d+),(?:(-1|inv),)?0x([0-9a-fA-F]{1,16})(?:,0x([0-9a-fA-F]{1,8}))?$"#)
        .expect("failed to compile regex")
});

fn parse_hex<T>(digits: &str, line: &str) -> Result<T, ParseError>
where
    T: TryFrom<u64>,
{
    u64::from_str_radix(digits, 16)
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| ParseError::InvalidFormat(line.to_string()))
}

impl FromStr for MemoryAccess {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let caps = TRACE_RECORD_PATTERN
            .captures(line)
            .ok_or_else(|| ParseError::InvalidFormat(line.to_string()))?;

        let insn_count = caps[1]
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidFormat(line.to_string()))?;
        let address = parse_hex::<u64>(&caps[3], line)?;
        let data = caps
            .get(4)
            .map(|m| parse_hex::<u32>(m.as_str(), line))
            .transpose()?;

        match caps.get(2).map(|m| m.as_str()) {
            Some("inv") if data.is_none() => Ok(MemoryAccess::Invalidate(InvalidateRecord {
                insn_count,
                address,
            })),
            Some("-1") => Ok(MemoryAccess::Regular(MemRecord {
                insn_count,
                address,
                store: true,
                data,
            })),
            None if data.is_none() => Ok(MemoryAccess::Regular(MemRecord {
                insn_count,
                address,
                store: false,
                data: None,
            })),
            _ => Err(ParseError::InvalidFormat(line.to_string())),
        }
    }
}
