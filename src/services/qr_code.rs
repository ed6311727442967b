use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ClassSession;
use crate::services::signature;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("PNG encoding failed: {0}")]
    PngEncoding(#[from] image::ImageError),
}

/// Payload encoded into a class session QR code.
///
/// `sig` is an HMAC-SHA256 over the serialization of the other fields
/// (i.e. with `sig` absent); scanners verify it before touching the
/// database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQrPayload {
    pub session_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl SessionQrPayload {
    pub fn from_session(session: &ClassSession) -> Self {
        Self {
            session_id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            sig: None,
        }
    }

    /// Serialization used for signing: the payload without its `sig` field.
    fn signing_string(&self) -> Result<String, QrGenerationError> {
        let unsigned = Self {
            sig: None,
            ..self.clone()
        };
        Ok(serde_json::to_string(&unsigned)?)
    }

    /// Signs the payload and returns the hex signature.
    pub fn sign(&self, signing_key: &[u8]) -> Result<String, QrGenerationError> {
        Ok(signature::sign(&self.signing_string()?, signing_key))
    }

    /// Checks the embedded `sig` against the signing key.
    pub fn verify(&self, signing_key: &[u8]) -> bool {
        let Some(ref sig) = self.sig else {
            return false;
        };
        let Ok(payload_str) = self.signing_string() else {
            return false;
        };
        signature::verify(&payload_str, sig, signing_key)
    }

    /// The JSON string actually rendered into the QR image.
    pub fn to_encoded_string(&self, sig: &str) -> Result<String, QrGenerationError> {
        let mut signed = self.clone();
        signed.sig = Some(sig.to_string());
        Ok(serde_json::to_string(&signed)?)
    }
}

/// Renders a signed payload as an SVG image.
pub fn generate_qr_svg(
    payload: &SessionQrPayload,
    sig: &str,
) -> Result<String, QrGenerationError> {
    let json_str = payload.to_encoded_string(sig)?;

    let code = QrCode::new(json_str.as_bytes())?;

    let svg = code.render::<svg::Color>().min_dimensions(200, 200).build();

    Ok(svg)
}

/// Renders a signed payload as a PNG.
pub fn generate_qr_png(
    payload: &SessionQrPayload,
    sig: &str,
) -> Result<Vec<u8>, QrGenerationError> {
    use image::{ImageBuffer, Luma};

    let json_str = payload.to_encoded_string(sig)?;

    let code = QrCode::new(json_str.as_bytes())?;

    // Each module is 10x10 pixels so phone cameras pick it up easily
    let module_size = 10u32;
    let width = code.width() as u32;
    let img_size = width * module_size;

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(img_size, img_size);

    for (x, y, color) in img.enumerate_pixels_mut() {
        let module_x = x / module_size;
        let module_y = y / module_size;
        let module_color = code[(module_x as usize, module_y as usize)];
        let pixel_value = match module_color {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
        *color = pixel_value;
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signature::derive_key;
    use chrono::Duration;

    fn payload() -> SessionQrPayload {
        let now = Utc::now();
        SessionQrPayload {
            session_id: Uuid::new_v4(),
            title: "Algorithms, week 3".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            sig: None,
        }
    }

    #[test]
    fn signing_roundtrip() {
        let key = derive_key("test-signing-key");
        let p = payload();
        let sig = p.sign(&key).unwrap();

        let mut signed = p.clone();
        signed.sig = Some(sig);
        assert!(signed.verify(&key));
    }

    #[test]
    fn verify_rejects_altered_fields() {
        let key = derive_key("test-signing-key");
        let p = payload();
        let sig = p.sign(&key).unwrap();

        let mut tampered = p.clone();
        tampered.sig = Some(sig);
        tampered.expires_at = tampered.expires_at + Duration::hours(24);
        assert!(!tampered.verify(&key));
    }

    #[test]
    fn verify_rejects_missing_signature() {
        let key = derive_key("test-signing-key");
        assert!(!payload().verify(&key));
    }

    #[test]
    fn encoded_string_carries_signature() {
        let key = derive_key("test-signing-key");
        let p = payload();
        let sig = p.sign(&key).unwrap();
        let encoded = p.to_encoded_string(&sig).unwrap();

        let parsed: SessionQrPayload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed.sig.as_deref(), Some(sig.as_str()));
        assert_eq!(parsed.session_id, p.session_id);
    }

    #[test]
    fn svg_generation() {
        let key = derive_key("test-signing-key");
        let p = payload();
        let sig = p.sign(&key).unwrap();

        let svg = generate_qr_svg(&p, &sig).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }
}
