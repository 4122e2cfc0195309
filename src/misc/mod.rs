use std::fmt::Display;

use color_eyre::owo_colors::OwoColorize;

pub struct ColourDot(pub bool);

impl From<Option<bool>> for ColourDot {
    fn from(flag: Option<bool>) -> Self {
        ColourDot(flag.unwrap_or(false))
    }
}

impl Display for ColourDot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let char = '●';

        if self.0 {
            write!(f, "{}", char.bright_green())
        } else {
            write!(f, "{}", char.bright_red())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_dot() {
        let on = ColourDot::from(Some(true)).to_string();
        let off = ColourDot::from(None).to_string();

        assert!(on.contains('●'));
        assert_ne!(on, off);
    }
}
