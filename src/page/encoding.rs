// src/page/encoding.rs
// =============================================================================
// Content-Encoding handling for the primary page.
//
// The page request advertises ACCEPT_ENCODING itself and reqwest is left to
// pass the body through untouched, so the Content-Encoding header the server
// chose survives into the snapshot. The body is decoded here.
// =============================================================================

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::io::{self, Read};

/// Sent on the page fetch and on every probe.
pub const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Undoes a Content-Encoding header value.
///
/// Codings are listed in the order they were applied, so they are removed
/// from last to first. A missing header, "identity" and empty entries leave
/// the body as is.
pub fn decode_body(content_encoding: Option<&str>, raw: &[u8]) -> io::Result<Vec<u8>> {
    let codings: Vec<String> = content_encoding
        .unwrap_or_default()
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty() && c != "identity")
        .collect();

    let mut body = raw.to_vec();
    for coding in codings.iter().rev() {
        body = decode_one(coding, &body)?;
    }
    Ok(body)
}

fn decode_one(coding: &str, input: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match coding {
        "gzip" | "x-gzip" => {
            GzDecoder::new(input).read_to_end(&mut out)?;
        }
        // "deflate" is meant to be zlib-wrapped, but raw deflate is common
        "deflate" => {
            if ZlibDecoder::new(input).read_to_end(&mut out).is_err() {
                out.clear();
                DeflateDecoder::new(input).read_to_end(&mut out)?;
            }
        }
        "br" => {
            brotli::Decompressor::new(input, 4096).read_to_end(&mut out)?;
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported content-encoding '{}'", other),
            ));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    const HTML: &str = "<html><head><title>Compressed</title></head><body>hello</body></html>";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_body_is_untouched() {
        assert_eq!(decode_body(None, HTML.as_bytes()).unwrap(), HTML.as_bytes());
        assert_eq!(decode_body(Some("identity"), HTML.as_bytes()).unwrap(), HTML.as_bytes());
    }

    #[test]
    fn test_gzip_body() {
        let decoded = decode_body(Some("GZIP"), &gzip(HTML.as_bytes())).unwrap();
        assert_eq!(decoded, HTML.as_bytes());
    }

    #[test]
    fn test_brotli_body() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(HTML.as_bytes()).unwrap();
        }
        assert_eq!(decode_body(Some("br"), &compressed).unwrap(), HTML.as_bytes());
    }

    #[test]
    fn test_raw_deflate_is_accepted() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(HTML.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decode_body(Some("deflate"), &compressed).unwrap(), HTML.as_bytes());
    }

    #[test]
    fn test_stacked_codings_are_undone_in_reverse() {
        let twice = gzip(&gzip(HTML.as_bytes()));
        assert_eq!(decode_body(Some("gzip, gzip"), &twice).unwrap(), HTML.as_bytes());
    }

    #[test]
    fn test_unknown_coding_is_an_error() {
        let err = decode_body(Some("compress"), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(decode_body(Some("gzip"), b"not gzip at all").is_err());
    }
}
