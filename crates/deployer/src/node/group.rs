//! node groups: a label (and color) shown for every node that belongs to it

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Yellow,
    Green,
    White,
    Magenta,
    Cyan,
    Blue,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, derive_new::new)]
pub struct Group {
    pub name: String,
    pub color: Color,
}

impl Group {
    pub fn production() -> Self {
        Self::new("Production".to_string(), Color::Red)
    }

    pub fn staging() -> Self {
        Self::new("Staging".to_string(), Color::Yellow)
    }

    pub fn beta() -> Self {
        Self::new("Beta".to_string(), Color::Green)
    }

    pub fn local() -> Self {
        Self::new("Local".to_string(), Color::Green)
    }

    pub fn other() -> Self {
        Self::new("Other".to_string(), Color::White)
    }

    pub fn utility() -> Self {
        Self::new("Utility".to_string(), Color::Magenta)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::other()
    }
}
