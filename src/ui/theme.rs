use colored::{Color, Colorize};

/// What a piece of text is, as far as styling goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Title,
    Error,
    Success,
    Selected,
    Subtle,
    Active,
    Inactive,
    Highlight,
    Key,
    Border,
    BorderFocus,
}

/// Palette used by every render function. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Theme {
    pub title: Color,
    pub error: Color,
    pub success: Color,
    pub selected: Color,
    pub subtle: Color,
    pub highlight: Color,
    pub border: Color,
    pub border_focus: Color,
    pub status_fg: Color,
    pub status_bg: Color,
    pub toast_fg: Color,
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::TrueColor { r, g, b }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: rgb(0x61, 0xAF, 0xEF),
            error: rgb(0xE0, 0x6C, 0x75),
            success: rgb(0x98, 0xC3, 0x79),
            selected: rgb(0xE5, 0xC0, 0x7B),
            subtle: rgb(0x5C, 0x63, 0x70),
            highlight: rgb(0xD1, 0x9A, 0x66),
            border: rgb(0x5C, 0x63, 0x70),
            border_focus: rgb(0xC6, 0x78, 0xDD),
            status_fg: rgb(0xAB, 0xB2, 0xBF),
            status_bg: rgb(0x28, 0x2C, 0x34),
            toast_fg: rgb(0xFF, 0xFF, 0xFF),
        }
    }
}

impl Theme {
    fn color(&self, role: Role) -> Color {
        match role {
            Role::Title => self.title,
            Role::Error | Role::Inactive => self.error,
            Role::Success | Role::Active => self.success,
            Role::Selected => self.selected,
            Role::Subtle => self.subtle,
            Role::Highlight | Role::Key => self.highlight,
            Role::Border => self.border,
            Role::BorderFocus => self.border_focus,
        }
    }

    fn bold(role: Role) -> bool {
        matches!(
            role,
            Role::Title | Role::Error | Role::Success | Role::Selected
        )
    }

    pub fn paint(&self, role: Role, text: &str) -> String {
        let styled = text.color(self.color(role));
        if Self::bold(role) {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    pub fn status_bar(&self, text: &str) -> String {
        text.color(self.status_fg).on_color(self.status_bg).to_string()
    }

    /// Inverted banner for transient messages.
    pub fn toast(&self, text: &str, error: bool) -> String {
        let bg = if error { self.error } else { self.success };
        text.color(self.toast_fg).on_color(bg).bold().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_keeps_text_visible() {
        let theme = Theme::default();
        let painted = theme.paint(Role::Title, "BURROW");
        assert_eq!(console::strip_ansi_codes(&painted), "BURROW");
    }

    #[test]
    fn roles_share_palette_entries() {
        let theme = Theme::default();
        assert_eq!(theme.color(Role::Active), theme.success);
        assert_eq!(theme.color(Role::Inactive), theme.error);
        assert_eq!(theme.color(Role::Key), theme.highlight);
    }
}
