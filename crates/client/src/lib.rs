pub mod controller;
pub mod error_parser;
pub mod image;
pub mod notice;
pub mod session;
pub mod transport;

pub use controller::{SessionController, StreamEvent};
pub use error_parser::{ErrorDetails, format_retry_time, is_quota_error, parse_error_details};
pub use image::{HttpImageLookup, ImageCompanion, ImageError, ImageLookup, ImageState, image_query};
pub use notice::{ErrorNotice, NoticeKind};
pub use session::{
    GenerationRequest, GenerationSession, Phase, RequestToken, StreamError, display_message,
};
pub use transport::{GenerationTransport, HttpTransport};
