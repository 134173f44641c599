use std::io::Write;

/// Writable view of the outbound HTTP response, implemented by the
/// transport.
///
/// Status and headers must be set before the first write to the output
/// stream; the built-in return mappers follow that order. Whether a late
/// `set_status` is honored or ignored is transport-defined - the engine
/// never relies on it.
pub trait HttpResponse: Send {
    /// Set the response status code.
    fn set_status(&mut self, status: u16);

    /// Set (or replace) a response header.
    fn set_header(&mut self, name: &str, value: &str);

    /// The writable body stream.
    fn writer(&mut self) -> &mut dyn Write;
}
