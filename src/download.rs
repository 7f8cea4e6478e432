//! Download staging: turn posted form data back into a file for the browser.

use crate::error::{EditorError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Everything outside RFC 5987 `attr-char` is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// A file the client asked us to hand back as an attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Download {
    /// Build from url-encoded form bodies, first source wins per field.
    ///
    /// Recognized fields: `filename`, `content_type`, `data`, `encoding`.
    /// `encoding=base64` means `data` is base64; anything else is taken as
    /// text.
    pub fn from_forms(sources: &[&[u8]]) -> Result<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();
        for source in sources {
            for (key, value) in url::form_urlencoded::parse(source) {
                fields
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }

        let filename = non_empty(&fields, "filename");
        let data = non_empty(&fields, "data");
        let (Some(filename), Some(data)) = (filename, data) else {
            return Err(EditorError::InvalidDownload(
                "missing filename or data".to_string(),
            ));
        };

        let content_type = non_empty(&fields, "content_type").unwrap_or(DEFAULT_CONTENT_TYPE);
        if !content_type.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
            return Err(EditorError::InvalidDownload(
                "content_type must be printable ASCII".to_string(),
            ));
        }
        let content_type = content_type.to_string();

        let body = match non_empty(&fields, "encoding") {
            Some("base64") => STANDARD
                .decode(data)
                .map_err(|e| EditorError::InvalidDownload(format!("invalid base64 data: {e}")))?,
            _ => data.as_bytes().to_vec(),
        };

        Ok(Self {
            filename: sanitize_filename(filename),
            content_type,
            body,
        })
    }

    /// `Content-Disposition` value for this file.
    ///
    /// Non-ASCII names get an ASCII `filename` fallback plus the exact name
    /// as an RFC 5987 `filename*` parameter.
    pub fn disposition(&self) -> String {
        if self.filename.is_ascii() {
            return format!("attachment; filename=\"{}\"", self.filename);
        }

        let fallback: String = self
            .filename
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(&self.filename, ATTR_CHAR)
        )
    }
}

fn non_empty<'a>(fields: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Strip characters that would break the quoted header value.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(forms: &[&str]) -> Result<Download> {
        let sources: Vec<&[u8]> = forms.iter().map(|f| f.as_bytes()).collect();
        Download::from_forms(&sources)
    }

    #[test]
    fn test_plain_text_download() {
        let download = parse(&["filename=diagram.mmd&data=graph%20TD%0A%20%20A--%3EB"]).unwrap();

        assert_eq!(download.filename, "diagram.mmd");
        assert_eq!(download.content_type, "application/octet-stream");
        assert_eq!(download.body, b"graph TD\n  A-->B");
    }

    #[test]
    fn test_base64_download() {
        let encoded = STANDARD.encode(b"\x89PNG\r\n");
        let form = format!(
            "filename=out.png&content_type=image%2Fpng&encoding=base64&data={}",
            url::form_urlencoded::byte_serialize(encoded.as_bytes()).collect::<String>()
        );

        let download = parse(&[form.as_str()]).unwrap();
        assert_eq!(download.content_type, "image/png");
        assert_eq!(download.body, b"\x89PNG\r\n");
    }

    #[test]
    fn test_missing_fields() {
        for form in ["filename=a.svg", "data=abc", "filename=&data=abc"] {
            assert!(
                matches!(parse(&[form]), Err(EditorError::InvalidDownload(_))),
                "accepted {form}"
            );
        }
    }

    #[test]
    fn test_invalid_base64() {
        let result = parse(&["filename=a.png&encoding=base64&data=%%%"]);
        assert!(matches!(result, Err(EditorError::InvalidDownload(_))));
    }

    #[test]
    fn test_first_source_wins() {
        let download = parse(&["filename=body.txt&data=x", "filename=query.txt"]).unwrap();
        assert_eq!(download.filename, "body.txt");
    }

    #[test]
    fn test_disposition_is_sanitized() {
        let download = parse(&["filename=a%22b%0D%0A.txt&data=x"]).unwrap();
        assert_eq!(download.disposition(), "attachment; filename=\"ab.txt\"");
    }

    #[test]
    fn test_content_type_with_line_break_is_rejected() {
        let result = parse(&[
            "filename=a.html&data=x&content_type=text%2Fhtml%0D%0AX-Injected%3A%20yes",
        ]);
        assert!(matches!(result, Err(EditorError::InvalidDownload(_))));
    }

    #[test]
    fn test_non_ascii_filename_disposition() {
        let download = parse(&["filename=diagramme-%C3%A9.svg&data=%3Csvg%2F%3E"]).unwrap();

        assert_eq!(download.filename, "diagramme-é.svg");
        let disposition = download.disposition();
        assert!(disposition.is_ascii());
        assert_eq!(
            disposition,
            "attachment; filename=\"diagramme-_.svg\"; filename*=UTF-8''diagramme-%C3%A9.svg"
        );
    }
}
