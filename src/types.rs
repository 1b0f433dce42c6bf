use serde::{Deserialize, Serialize};

/// Side length of the abstract grid the model uses for screen positions.
/// Valid grid coordinates are `0..=GRID_MAX`.
pub const GRID_MAX: f64 = 999.0;

/// A point on the model's 0-999 grid, independent of the viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

impl GridPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in real viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single UI action the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click(GridPoint),
    DoubleClick(GridPoint),
    RightClick(GridPoint),
    Type { text: String },
    /// Keys pressed together as one chord.
    Hotkey { keys: Vec<String> },
    /// Positive `dy` scrolls toward later content.
    Scroll { dx: i64, dy: i64 },
    Drag { from: GridPoint, to: GridPoint },
    Navigate { url: String },
    Wait { seconds: f64 },
    Done { result: String },
    /// Valid JSON whose action name is missing or not recognised.
    Unknown { name: Option<String> },
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Click(_) => "click",
            Action::DoubleClick(_) => "double_click",
            Action::RightClick(_) => "right_click",
            Action::Type { .. } => "type",
            Action::Hotkey { .. } => "hotkey",
            Action::Scroll { .. } => "scroll",
            Action::Drag { .. } => "drag",
            Action::Navigate { .. } => "navigate",
            Action::Wait { .. } => "wait",
            Action::Done { .. } => "done",
            Action::Unknown { name } => name.as_deref().unwrap_or("<missing>"),
        }
    }
}

/// What the loop should do after an action ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    /// The task finished; carries the model's final result text.
    Stop { result: String },
}

pub const DEFAULT_START_URL: &str = "https://wikipedia.com";
pub const DEFAULT_MAX_STEPS: usize = 10;
pub const DEFAULT_WAIT_SECS: f64 = 1.0;
