pub mod buffer;
pub mod payload;
pub mod transport;
pub mod uploader;

pub use buffer::DeliveryBuffer;
pub use transport::{HttpsTransport, Transport};
pub use uploader::{Backoff, Outcome, Uploader};
