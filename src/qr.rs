// Terminal QR rendering for the login URL.

use anyhow::{Context, Result};
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};

/// Render `data` with half-height block characters so the code fits a
/// normal terminal. Low error correction keeps it small.
pub fn render_terminal(data: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .context("Failed to encode login URL as QR code")?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_block_characters() {
        let text = render_terminal("https://passport.bilibili.com/qrcode/h5/login?oauthKey=abc").unwrap();
        assert!(text.lines().count() > 10);
        assert!(text.chars().any(|c| c == '█' || c == '▀' || c == '▄'));
    }
}
