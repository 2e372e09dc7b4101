use std::sync;

use hex_literal::hex;
use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn bytes(bytes: [u8; 4]) -> Rgba {
        Rgba {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }
}

/// Shared row style. The original debugger restated its palette per view
/// class; every renderer here reads the one instance instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub row_text_color: Rgba,
    pub selected_row_text_color: Rgba,
    pub selected_row_background: Rgba,

    pub indent_width: usize, /* spaces per tree level in plain renderings */
}

impl Default for Config {
    fn default() -> Self {
        Config {
            /* solarized values carried over from the original debugger */
            row_text_color: Rgba::bytes(hex!("839496ff")),          /* base0 */
            selected_row_text_color: Rgba::bytes(hex!("00212aff")), /* base04 */
            selected_row_background: Rgba::bytes(hex!("839496ff")), /* base0 */

            indent_width: 2,
        }
    }
}

#[derive(Default, Deserialize)]
struct Overlay {
    row_text_color: Option<Rgba>,
    selected_row_text_color: Option<Rgba>,
    selected_row_background: Option<Rgba>,
    indent_width: Option<usize>,
}

impl Config {
    /// Applies a TOML fragment on top of the current values. Keys that the
    /// fragment doesn't name are left alone.
    pub fn overlay_toml(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let overlay: Overlay = toml::from_str(text)?;

        if let Some(v) = overlay.row_text_color { self.row_text_color = v; }
        if let Some(v) = overlay.selected_row_text_color { self.selected_row_text_color = v; }
        if let Some(v) = overlay.selected_row_background { self.selected_row_background = v; }
        if let Some(v) = overlay.indent_width { self.indent_width = v; }

        Ok(())
    }
}

lazy_static! {
    static ref INSTANCE: sync::RwLock<Config> = sync::RwLock::new(Config::default());
}

pub fn get() -> sync::RwLockReadGuard<'static, Config> {
    INSTANCE.read().unwrap()
}

pub fn set() -> sync::RwLockWriteGuard<'static, Config> {
    INSTANCE.write().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overlay_changes_only_named_keys() {
        let mut config = Config::default();
        config.overlay_toml("indent_width = 4").unwrap();

        assert_eq!(config.indent_width, 4);
        assert_eq!(config.row_text_color, Config::default().row_text_color);
    }

    #[test]
    fn test_overlay_color() {
        let mut config = Config::default();
        config.overlay_toml("selected_row_background = { r = 7, g = 54, b = 66, a = 255 }").unwrap();

        assert_eq!(config.selected_row_background, Rgba { r: 7, g: 54, b: 66, a: 255 });
        assert_eq!(config.indent_width, Config::default().indent_width);
    }

    #[test]
    fn test_overlay_rejects_malformed_toml() {
        let mut config = Config::default();
        assert!(config.overlay_toml("indent_width = ").is_err());
    }
}
