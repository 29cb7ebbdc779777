//! The slice of an HTTP response the renderer writes into.

use std::io;

/// Anything that can accept rendered bytes as a response body.
pub trait ResponseSink {
  /// Append `bytes` to the body.
  fn write_body(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl ResponseSink for Vec<u8> {
  fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
    self.extend_from_slice(bytes);
    Ok(())
  }
}

impl ResponseSink for String {
  fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
    let text = std::str::from_utf8(bytes)
      .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    self.push_str(text);
    Ok(())
  }
}
