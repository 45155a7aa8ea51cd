//! Request handlers.

pub mod records;
pub mod stream;

pub use records::Record;
pub use stream::StreamSink;
