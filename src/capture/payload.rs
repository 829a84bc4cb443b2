use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use super::CaptureError;

lazy_static! {
    static ref DATA_URL_RE: Regex =
        Regex::new(r"^data:([\w.+-]+/[\w.+-]+)?(;[^,;]+)*;base64,").unwrap();
}

/// One captured image, base64 text plus MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub id: Uuid,
    pub data: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Parses `data:<mime>;base64,<body>`, the form a browser file reader produces.
    pub fn from_data_url(url: &str) -> Result<Self, CaptureError> {
        let url = url.trim();
        let caps = DATA_URL_RE
            .captures(url)
            .ok_or_else(|| CaptureError::InvalidUpload("not a base64 data URL".into()))?;
        let header_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let mime_type = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data: String = url[header_len..]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        general_purpose::STANDARD
            .decode(&data)
            .map_err(|e| CaptureError::InvalidUpload(format!("invalid base64: {e}")))?;
        Ok(Self {
            id: Uuid::new_v4(),
            data,
            mime_type,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Approximate decoded size, for logging.
    pub fn byte_len(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

#[cfg(test)]
mod payload_tests {
    use super::*;

    #[test]
    fn from_bytes_encodes_base64() {
        let p = ImagePayload::from_bytes(b"hello", "image/png");
        assert_eq!(p.data, "aGVsbG8=");
        assert_eq!(p.mime_type, "image/png");
        assert_eq!(p.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn data_url_is_split_into_mime_and_body() {
        let p = ImagePayload::from_data_url("data:image/webp;base64,aGVsbG8=").unwrap();
        assert_eq!(p.mime_type, "image/webp");
        assert_eq!(p.data, "aGVsbG8=");
    }

    #[test]
    fn data_url_with_extra_parameters() {
        let p = ImagePayload::from_data_url("data:image/jpeg;name=a.jpg;base64,aGVsbG8=")
            .unwrap();
        assert_eq!(p.mime_type, "image/jpeg");
        assert_eq!(p.data, "aGVsbG8=");
    }

    #[test]
    fn data_url_without_mime_falls_back_to_octet_stream() {
        let p = ImagePayload::from_data_url("data:;base64,aGVsbG8=").unwrap();
        assert_eq!(p.mime_type, "application/octet-stream");
    }

    #[test]
    fn rejects_plain_text_and_bad_base64() {
        assert!(matches!(
            ImagePayload::from_data_url("hello"),
            Err(CaptureError::InvalidUpload(_))
        ));
        assert!(matches!(
            ImagePayload::from_data_url("data:image/png;base64,@@@"),
            Err(CaptureError::InvalidUpload(_))
        ));
    }

    #[test]
    fn every_capture_gets_a_fresh_id() {
        let a = ImagePayload::from_bytes(b"x", "image/png");
        let b = ImagePayload::from_bytes(b"x", "image/png");
        assert_ne!(a.id, b.id);
    }
}
