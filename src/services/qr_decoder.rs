use thiserror::Error;

use crate::services::qr_code::SessionQrPayload;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unreadable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("No QR code detected in the image")]
    NoQrFound,

    #[error("QR content could not be decoded: {0}")]
    Unreadable(String),

    #[error("QR payload is not a session record: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Extracts the raw QR content from an uploaded image.
///
/// The image is converted to grayscale and handed to the detector; when
/// several codes are present the first detected grid wins, matching the
/// one-code-per-frame behavior of a camera scanner.
pub fn decode_image(bytes: &[u8]) -> Result<String, DecodeError> {
    let gray = image::load_from_memory(bytes)?.to_luma8();
    let (width, height) = gray.dimensions();

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );

    let grids = prepared.detect_grids();
    let grid = grids.first().ok_or(DecodeError::NoQrFound)?;

    let (_meta, content) = grid
        .decode()
        .map_err(|e| DecodeError::Unreadable(e.to_string()))?;

    Ok(content)
}

/// Parses decoded QR content as a session payload.
///
/// A well-formed payload must carry `session_id`; anything else is a
/// decode error, never a silent no-op.
pub fn parse_payload(content: &str) -> Result<SessionQrPayload, DecodeError> {
    let payload: SessionQrPayload = serde_json::from_str(content)?;
    Ok(payload)
}

/// Decodes an uploaded image straight to a parsed payload.
pub fn decode_and_parse(bytes: &[u8]) -> Result<SessionQrPayload, DecodeError> {
    let content = decode_image(bytes)?;
    parse_payload(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::qr_code::{generate_qr_png, SessionQrPayload};
    use crate::services::signature::derive_key;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn signed_png() -> (SessionQrPayload, String, Vec<u8>) {
        let now = Utc::now();
        let payload = SessionQrPayload {
            session_id: Uuid::new_v4(),
            title: "Databases lab".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(30),
            sig: None,
        };
        let key = derive_key("test-signing-key");
        let sig = payload.sign(&key).unwrap();
        let png = generate_qr_png(&payload, &sig).unwrap();
        (payload, sig, png)
    }

    #[test]
    fn decodes_generated_png() {
        let (payload, sig, png) = signed_png();

        let parsed = decode_and_parse(&png).unwrap();
        assert_eq!(parsed.session_id, payload.session_id);
        assert_eq!(parsed.title, payload.title);
        assert_eq!(parsed.sig.as_deref(), Some(sig.as_str()));
    }

    #[test]
    fn decoded_payload_verifies() {
        let (_, _, png) = signed_png();
        let key = derive_key("test-signing-key");

        let parsed = decode_and_parse(&png).unwrap();
        assert!(parsed.verify(&key));
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::Image(_))));
    }

    #[test]
    fn blank_image_has_no_qr() {
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            64,
            64,
            image::Luma([255u8]),
        ));
        let mut png = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageFormat::Png,
        )
        .unwrap();

        let result = decode_image(&png);
        assert!(matches!(result, Err(DecodeError::NoQrFound)));
    }

    #[test]
    fn non_session_json_is_malformed() {
        let result = parse_payload(r#"{"email":"someone@example.com"}"#);
        assert!(matches!(result, Err(DecodeError::MalformedPayload(_))));
    }

    #[test]
    fn non_json_content_is_malformed() {
        let result = parse_payload("https://example.com/not-a-payload");
        assert!(matches!(result, Err(DecodeError::MalformedPayload(_))));
    }
}
