mod http_transport;
mod transport;

pub use http_transport::{parse_http_url, HttpTransport};
pub use transport::Transport;
