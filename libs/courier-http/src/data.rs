use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Request or response payload.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Data {
    /// Structured JSON value
    Json(Value),
    /// Text payload
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Multipart form data
    Form(FormData),
}

impl Data {
    /// `true` for a JSON object payload (the "plain object" case).
    #[must_use]
    pub fn is_plain_object(&self) -> bool {
        matches!(self, Data::Json(Value::Object(_)))
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Deserialize the payload into `T`.
    ///
    /// JSON values convert directly; text and bytes are parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the payload does not deserialize into `T`.
    /// Form payloads always fail.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Data::Json(v) => T::deserialize(v),
            Data::Text(s) => serde_json::from_str(s),
            Data::Bytes(b) => serde_json::from_slice(b),
            Data::Form(_) => Err(serde::de::Error::custom(
                "multipart form data cannot be deserialized",
            )),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_owned())
    }
}

impl From<Bytes> for Data {
    fn from(value: Bytes) -> Self {
        Data::Bytes(value)
    }
}

impl From<FormData> for Data {
    fn from(value: FormData) -> Self {
        Data::Form(value)
    }
}

/// Value of a single multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        content: Bytes,
    },
}

/// Multipart form body.
///
/// The transport encodes it and sets a boundary-aware `Content-Type` itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), FormValue::Text(value.into())));
        self
    }

    /// Append a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<&str>,
        content: Bytes,
    ) -> Self {
        self.fields.push((
            name.into(),
            FormValue::File {
                filename: filename.into(),
                content_type: content_type.map(str::to_owned),
                content,
            },
        ));
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    /// Encode as `multipart/form-data` with the given boundary.
    #[must_use]
    pub fn encode(&self, boundary: &str) -> Bytes {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            let name = escape_disposition(name);
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match value {
                FormValue::Text(text) => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    out.extend_from_slice(text.as_bytes());
                }
                FormValue::File {
                    filename,
                    content_type,
                    content,
                } => {
                    let filename = escape_disposition(filename);
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    let content_type = content_type
                        .as_deref()
                        .map_or_else(|| "application/octet-stream".to_owned(), escape_disposition);
                    out.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                    out.extend_from_slice(content);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Bytes::from(out)
    }
}

/// Percent-escape `"`, CR and LF so a value cannot break out of its header.
fn escape_disposition(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object_detection() {
        assert!(Data::Json(json!({"a": 1})).is_plain_object());
        assert!(!Data::Json(json!([1, 2])).is_plain_object());
        assert!(!Data::Text("{}".to_owned()).is_plain_object());
    }

    #[test]
    fn test_deserialize_from_text_and_json() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct User {
            name: String,
        }

        let from_json: User = Data::Json(json!({"name": "ann"})).deserialize().unwrap();
        let from_text: User = Data::from(r#"{"name":"ann"}"#).deserialize().unwrap();
        assert_eq!(from_json, from_text);
        assert!(Data::Form(FormData::new()).deserialize::<User>().is_err());
    }

    #[test]
    fn test_form_encoding() {
        let form = FormData::new().text("title", "hello").file(
            "doc",
            "a.txt",
            Some("text/plain"),
            Bytes::from_static(b"abc"),
        );

        let encoded = form.encode("XyZ");
        let text = String::from_utf8(encoded.to_vec()).unwrap();
        assert_eq!(
            text,
            "--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
             --XyZ\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nabc\r\n--XyZ--\r\n"
        );
    }

    #[test]
    fn test_form_encoding_escapes_quotes_and_line_breaks() {
        let form = FormData::new()
            .text("a\"b", "v")
            .file(
                "f\r\nX-Injected: 1",
                "evil\".txt",
                Some("text/plain\r\nX-Other: 2"),
                Bytes::from_static(b"z"),
            );

        let text = String::from_utf8(form.encode("B").to_vec()).unwrap();
        assert_eq!(
            text,
            "--B\r\nContent-Disposition: form-data; name=\"a%22b\"\r\n\r\nv\r\n\
             --B\r\nContent-Disposition: form-data; name=\"f%0D%0AX-Injected: 1\"; filename=\"evil%22.txt\"\r\n\
             Content-Type: text/plain%0D%0AX-Other: 2\r\n\r\nz\r\n--B--\r\n"
        );
    }
}
