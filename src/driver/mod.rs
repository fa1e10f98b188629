/* Driver framework: the WmiTransport trait every controller backend implements, the ACPI payload
 * model returned by block queries, and the acpi_call backed transport used on real hardware. */
pub mod channel;
pub mod excalibur;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/* Failures raised by a transport before any protocol interpretation happens. */
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ACPI method failed: {0}")]
    Acpi(String),

    #[error("Unparsable ACPI reply: {0:?}")]
    Reply(String),

    #[error("Controller returned no data")]
    NoData,
}

/* A value returned by the firmware, tagged with its ACPI object type. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcpiObject {
    Integer(u64),
    String(String),
    Buffer(Vec<u8>),
    Package(Vec<AcpiObject>),
}

impl AcpiObject {
    /* Short type name used in diagnostics. */
    pub fn kind(&self) -> &'static str {
        match self {
            AcpiObject::Integer(_) => "integer",
            AcpiObject::String(_) => "string",
            AcpiObject::Buffer(_) => "buffer",
            AcpiObject::Package(_) => "package",
        }
    }
}

/* The raw block primitives of a WMI data block.                    */
/*                                                                  */
/* `set_block` hands a buffer to the firmware; `query_block` asks   */
/* for the current contents of the block. Callers must serialize    */
/* access themselves: the controller keeps one global register      */
/* window and has no notion of concurrent transactions.             */
pub trait WmiTransport: Send + Sync {
    /* Returns the backend name for logging purposes. */
    fn name(&self) -> &str;

    fn set_block(&self, instance: u8, input: &[u8]) -> Result<(), TransportError>;

    /* `Ok(None)` means the firmware produced no object at all. */
    fn query_block(&self, instance: u8) -> Result<Option<AcpiObject>, TransportError>;
}

/* Method paths used to reach the WMI block through acpi_call. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcpiCallConfig {
    pub call_path: PathBuf,
    pub set_method: String,
    pub query_method: String,
}

/* Transport over the `acpi_call` kernel module.                     */
/*                                                                   */
/* A request is a textual method invocation written to the call file; */
/* the result is read back from the same file in acpi_call notation.  */
pub struct AcpiCallTransport {
    config: AcpiCallConfig,
}

impl AcpiCallTransport {
    pub fn new(config: AcpiCallConfig) -> Self {
        Self { config }
    }

    /* Issue one method call and return the raw textual reply. */
    fn call(&self, request: &str) -> Result<String, TransportError> {
        let path = &self.config.call_path;
        std::fs::write(path, request).map_err(|source| io_error(path, source))?;
        debug!("TX {request}");

        let reply = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        debug!("RX {}", reply.trim_end_matches('\0'));
        Ok(reply)
    }
}

impl WmiTransport for AcpiCallTransport {
    fn name(&self) -> &str {
        "acpi_call"
    }

    fn set_block(&self, instance: u8, input: &[u8]) -> Result<(), TransportError> {
        let request = format!(
            "{} {} {}",
            self.config.set_method,
            instance,
            encode_buffer_argument(input)
        );
        let reply = self.call(&request)?;
        /* The set method's own return value carries nothing; only failures matter. */
        parse_acpi_call_reply(&reply).map(|_| ())
    }

    fn query_block(&self, instance: u8) -> Result<Option<AcpiObject>, TransportError> {
        let request = format!("{} {}", self.config.query_method, instance);
        let reply = self.call(&request)?;
        parse_acpi_call_reply(&reply)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> TransportError {
    TransportError::Io {
        path: path.display().to_string(),
        source,
    }
}

/* Encode a byte slice as an acpi_call buffer literal: `b` followed by hex digits. */
pub fn encode_buffer_argument(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(1 + bytes.len() * 2);
    out.push('b');
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/* Parse an acpi_call reply.                                       */
/*                                                                 */
/* `0x2a` integer, `"text"` string, `{0x01, 0x02}` buffer,          */
/* `[0x1, "a"]` package, `Error: AE_...` failure. An empty reply    */
/* or `not called` means the method produced nothing.              */
pub fn parse_acpi_call_reply(reply: &str) -> Result<Option<AcpiObject>, TransportError> {
    let reply = reply.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if reply.is_empty() || reply == "not called" {
        return Ok(None);
    }
    if let Some(status) = reply.strip_prefix("Error:") {
        return Err(TransportError::Acpi(status.trim().to_string()));
    }
    parse_value(reply).map(Some)
}

fn parse_value(s: &str) -> Result<AcpiObject, TransportError> {
    let s = s.trim();
    let bad = || TransportError::Reply(s.to_string());

    if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let bytes = split_top_level(inner)
            .into_iter()
            .map(|item| {
                parse_integer(item)
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(bad)
            })
            .collect::<Result<Vec<u8>, _>>()?;
        return Ok(AcpiObject::Buffer(bytes));
    }

    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let items = split_top_level(inner)
            .into_iter()
            .map(parse_value)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(AcpiObject::Package(items));
    }

    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return Ok(AcpiObject::String(s[1..s.len() - 1].to_string()));
    }

    parse_integer(s).map(AcpiObject::Integer).ok_or_else(bad)
}

fn parse_integer(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/* Split on commas that are not nested inside brackets, braces or quotes. */
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = s[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_buffer_argument() {
        assert_eq!(encode_buffer_argument(&[0x00, 0xfb, 0x0a]), "b00fb0a");
        assert_eq!(encode_buffer_argument(&[]), "b");
    }

    #[test]
    fn test_parse_reply_buffer() {
        let obj = parse_acpi_call_reply("{0x00, 0xfa, 0x01, 0x02}").unwrap();
        assert_eq!(obj, Some(AcpiObject::Buffer(vec![0x00, 0xfa, 0x01, 0x02])));
    }

    #[test]
    fn test_parse_reply_empty_buffer() {
        let obj = parse_acpi_call_reply("{}").unwrap();
        assert_eq!(obj, Some(AcpiObject::Buffer(vec![])));
    }

    #[test]
    fn test_parse_reply_integer_and_string() {
        assert_eq!(
            parse_acpi_call_reply("0x2a").unwrap(),
            Some(AcpiObject::Integer(42))
        );
        assert_eq!(
            parse_acpi_call_reply("\"CP131\"").unwrap(),
            Some(AcpiObject::String("CP131".into()))
        );
    }

    #[test]
    fn test_parse_reply_package() {
        let obj = parse_acpi_call_reply("[0x1, \"a,b\", {0x02}]").unwrap();
        assert_eq!(
            obj,
            Some(AcpiObject::Package(vec![
                AcpiObject::Integer(1),
                AcpiObject::String("a,b".into()),
                AcpiObject::Buffer(vec![0x02]),
            ]))
        );
    }

    #[test]
    fn test_parse_reply_no_data() {
        assert_eq!(parse_acpi_call_reply("").unwrap(), None);
        assert_eq!(parse_acpi_call_reply("not called\0").unwrap(), None);
    }

    #[test]
    fn test_parse_reply_error() {
        match parse_acpi_call_reply("Error: AE_NOT_FOUND") {
            Err(TransportError::Acpi(status)) => assert_eq!(status, "AE_NOT_FOUND"),
            other => panic!("Expected ACPI error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_garbage() {
        assert!(matches!(
            parse_acpi_call_reply("{0x100}"),
            Err(TransportError::Reply(_))
        ));
        assert!(matches!(
            parse_acpi_call_reply("hello"),
            Err(TransportError::Reply(_))
        ));
    }

    #[test]
    fn test_acpi_object_kind() {
        assert_eq!(AcpiObject::Buffer(vec![]).kind(), "buffer");
        assert_eq!(AcpiObject::Integer(0).kind(), "integer");
    }
}
