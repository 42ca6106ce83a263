//! base64url body decoding.
//!
//! Gmail-style payloads carry body data in the URL-safe base64 alphabet
//! (`-` and `_` in place of `+` and `/`), usually with the trailing `=`
//! padding omitted. The engine here accepts both padded and unpadded
//! input, so re-padding to a multiple of four never has to be done by
//! hand.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::DecodeError;

/// URL-safe engine that tolerates both padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url string into UTF-8 text.
///
/// Fails if the input contains characters outside the URL-safe alphabet
/// or if the decoded bytes are not valid UTF-8. Either failure is a
/// per-message problem, never a reason to stop a run.
pub fn decode_body(data: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE_LENIENT.decode(data)?;
    Ok(String::from_utf8(bytes)?)
}
