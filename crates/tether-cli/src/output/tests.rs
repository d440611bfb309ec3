// Tests for output formatting
//
// Writers are pointed at an in-memory buffer so rendered text can be asserted.

use super::*;
use std::sync::{Arc, Mutex};

const LEAF: &[u8] = include_bytes!("../../../tether-core/tests/fixtures/leaf.der");

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn writer(format: OutputFormat, quiet: bool) -> (OutputWriter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let writer = OutputWriter::with_writer(format, false, quiet, Box::new(buffer.clone()));
    (writer, buffer)
}

#[test]
fn test_certificate_formatting_human() {
    let summary = CertificateSummary::from_der(LEAF).unwrap();
    let formatted = OutputFormat::Human.format_certificate(&summary).unwrap();

    assert!(formatted.contains("Key algorithm: EC"));
    assert!(formatted.contains("api.example.com"));
    assert!(formatted.contains(&summary.fingerprint));
    assert!(formatted.contains(&summary.public_key_fingerprint));
}

#[test]
fn test_certificate_formatting_json() {
    let summary = CertificateSummary::from_der(LEAF).unwrap();
    let formatted = OutputFormat::Json.format_certificate(&summary).unwrap();

    let value: serde_json::Value = serde_json::from_str(&formatted).unwrap();
    assert_eq!(value["fingerprint"], summary.fingerprint.as_str());
    assert_eq!(value["dns_names"][0], "api.example.com");
}

#[test]
fn test_messages_suppressed_for_machine_formats() {
    let (mut out, buffer) = writer(OutputFormat::Json, false);
    out.info("loading").unwrap();
    out.success("done").unwrap();
    out.warning("careful").unwrap();
    out.data(&serde_json::json!({"host": "api.example.com"})).unwrap();

    assert_eq!(buffer.contents(), "{\"host\":\"api.example.com\"}\n");
}

#[test]
fn test_quiet_keeps_warnings_and_data() {
    let (mut out, buffer) = writer(OutputFormat::Human, true);
    out.info("loading").unwrap();
    out.success("done").unwrap();
    out.warning("careful").unwrap();

    assert_eq!(buffer.contents(), "WARNING: careful\n");
}

#[test]
fn test_table_alignment() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    let rows = vec![
        vec!["api.example.com".to_string(), "certificate".to_string()],
        vec!["a.io".to_string(), "public-key".to_string()],
    ];
    out.table(&["HOST", "STRATEGY"], &rows).unwrap();

    let contents = buffer.contents();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "HOST            │ STRATEGY");
    assert_eq!(lines[2], "api.example.com │ certificate");
    assert_eq!(lines[3], "a.io            │ public-key");
}

#[test]
fn test_table_skipped_for_yaml() {
    let (mut out, buffer) = writer(OutputFormat::Yaml, false);
    out.table(&["HOST"], &[vec!["a.io".to_string()]]).unwrap();
    assert!(buffer.contents().is_empty());
}

#[test]
fn test_no_spinner_with_custom_writer() {
    let (out, _) = writer(OutputFormat::Human, false);
    assert!(out.spinner("fetching").is_none());
}
