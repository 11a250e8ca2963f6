//! Event passes — door-scan validation and the QR payload.

pub mod qr;
pub mod render;
pub mod verdict;

pub use qr::validation_url;
pub use render::{PassFormat, render_html};
pub use verdict::{PassError, PassQuery, PassVerdict, VerdictColor, validate_pass};
