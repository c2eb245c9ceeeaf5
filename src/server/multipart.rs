//! `multipart/form-data` body parsing. Parts borrow from the body; nothing is copied.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("request is not multipart/form-data")]
    NotMultipart,
    #[error("multipart boundary missing")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    Malformed(&'static str),
}

/// One form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'a> {
    pub name: String,
    /// Present for file inputs, absent for text fields.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: &'a [u8],
}

#[derive(Debug, Default)]
pub struct FormData<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> FormData<'a> {
    /// First part named `name`.
    pub fn part(&self, name: &str) -> Option<&Part<'a>> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Trimmed text of field `name`; `None` when missing or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        let part = self.part(name)?;
        let text = String::from_utf8_lossy(part.data);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Boundary from a `Content-Type` header value.
pub fn boundary(content_type: &str) -> Result<&str, MultipartError> {
    let mut params = header_params(content_type).into_iter();
    let mime = params.next().unwrap_or("").trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }
    params
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"'))
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

pub fn parse<'a>(body: &'a [u8], boundary: &str) -> Result<FormData<'a>, MultipartError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let close = [b"\r\n".as_slice(), delimiter].concat();

    let start = find(body, delimiter).ok_or(MultipartError::Malformed("no opening boundary"))?;
    let mut pos = start + delimiter.len();
    let mut form = FormData::default();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        pos += line_break_len(rest).ok_or(MultipartError::Malformed("boundary not followed by CRLF"))?;

        let head_len = find(&body[pos..], b"\r\n\r\n").ok_or(MultipartError::Malformed("unterminated part headers"))?;
        let head = std::str::from_utf8(&body[pos..pos + head_len])
            .map_err(|_| MultipartError::Malformed("part headers are not UTF-8"))?;
        let content_start = pos + head_len + 4;

        let content_len = find(&body[content_start..], &close).ok_or(MultipartError::Malformed("missing closing boundary"))?;
        let data = &body[content_start..content_start + content_len];
        form.parts.push(part_from_headers(head, data)?);
        pos = content_start + content_len + close.len();
    }
}

fn line_break_len(rest: &[u8]) -> Option<usize> {
    if rest.starts_with(b"\r\n") {
        Some(2)
    } else if rest.starts_with(b"\n") {
        Some(1)
    } else {
        None
    }
}

fn part_from_headers<'a>(head: &str, data: &'a [u8]) -> Result<Part<'a>, MultipartError> {
    let mut name = None;
    let mut file_name = None;
    let mut content_type = None;
    for line in head.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in header_params(value).into_iter().skip(1) {
                let Some((k, v)) = param.trim().split_once('=') else {
                    continue;
                };
                let v = unquote(v.trim());
                match k.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(v),
                    "filename" => file_name = Some(v),
                    _ => {}
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    let name = name.ok_or(MultipartError::Malformed("part without a name"))?;
    Ok(Part {
        name,
        file_name,
        content_type,
        data,
    })
}

/// Split a header value on `;` outside quoted strings.
fn header_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(v: &str) -> String {
    let Some(inner) = v.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return v.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, _) = needle.split_first()?;
    let mut offset = 0;
    while offset + needle.len() <= haystack.len() {
        let i = haystack[offset..=haystack.len() - needle.len()]
            .iter()
            .position(|&b| b == first)?;
        let at = offset + i;
        if haystack[at..].starts_with(needle) {
            return Some(at);
        }
        offset = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_from_header() {
        assert_eq!(
            boundary("multipart/form-data; boundary=\"xyz\""),
            Ok("xyz")
        );
        assert_eq!(boundary("application/json"), Err(MultipartError::NotMultipart));
        assert_eq!(
            boundary("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        );
    }

    #[test]
    fn quoted_params_keep_semicolons() {
        assert_eq!(
            header_params(r#"form-data; name="video"; filename="a;b.mp4""#),
            vec!["form-data", r#" name="video""#, r#" filename="a;b.mp4""#]
        );
        assert_eq!(unquote(r#""say \"hi\".mp4""#), r#"say "hi".mp4"#);
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn find_needle() {
        assert_eq!(find(b"aab--xab", b"ab"), Some(1));
        assert_eq!(find(b"aaa", b"ab"), None);
        assert_eq!(find(b"", b"ab"), None);
    }

    #[test]
    fn body_containing_boundary_prefix_without_crlf() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.bin\"\r\n\r\n--b--inner\r\n--b--\r\n";
        let form = parse(body, "b").unwrap();
        assert_eq!(form.part("f").unwrap().data, b"--b--inner");
    }
}
