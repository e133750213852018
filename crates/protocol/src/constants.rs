//! Wire-level constants for the multipart upload request.

/// Multipart field name carrying the file payload.
pub const FILE_FIELD_NAME: &str = "file";

/// Default HTTP method when a transport config leaves it unset.
pub const DEFAULT_METHOD: &str = "POST";

/// Default `Accept` header value.
pub const DEFAULT_ACCEPT: &str = "application/json";

/// Default `Cache-Control` header value.
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";

/// Header marking the request as issued by a script rather than a form post.
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";

/// Default value for [`REQUESTED_WITH_HEADER`].
pub const DEFAULT_REQUESTED_WITH: &str = "XMLHttpRequest";

/// The only HTTP status treated as a successful upload.
pub const SUCCESS_STATUS: u16 = 200;

/// Response code recorded when no response was received at all.
pub const NO_RESPONSE_CODE: u16 = 0;

/// Response text used when the server gave no usable status text.
pub const INVALID_RESPONSE_TEXT: &str = "Invalid response from server";
