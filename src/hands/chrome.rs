//! Sessions backed by a local Chrome driven over CDP.
//!
//! `headless_chrome` is blocking, so every call hops onto the blocking pool
//! and is awaited straight away; calls never overlap.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input::{
    DispatchMouseEvent, DispatchMouseEventTypeOption, MouseButton,
};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{info, warn};

use super::{Screenshot, Session, SessionError, SessionProvider};
use crate::types::{PixelPoint, Viewport};

const DEBUG_PORT_URL: &str = "http://127.0.0.1:9222";

#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Profile directory; a per-user default is used when unset.
    pub profile_dir: Option<PathBuf>,
    /// Try to attach to a Chrome already listening on port 9222 first.
    pub attach: bool,
}

pub struct ChromeProvider {
    options: ChromeOptions,
}

impl ChromeProvider {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionProvider for ChromeProvider {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        let options = self.options.clone();
        let (browser, tab) = tokio::task::spawn_blocking(move || launch(&options))
            .await
            .map_err(|e| anyhow!("Browser launch panicked: {}", e))??;

        let id = format!("chrome-{:016x}", rand::random::<u64>());
        info!("[Hands] Chrome session {} ready.", id);
        Ok(Box::new(ChromeSession {
            _browser: browser,
            tab,
            id,
        }))
    }
}

fn launch(options: &ChromeOptions) -> Result<(Browser, Arc<Tab>)> {
    if options.attach {
        info!("[Hands] Attempting to attach to existing Chrome on port 9222...");
        if let Ok(browser) = Browser::connect(DEBUG_PORT_URL.to_string()) {
            info!("[Hands] Attached to existing Chrome.");
            let tab = browser.new_tab()?;
            return Ok((browser, tab));
        }
        warn!("[Hands] Could not attach. Launching a fresh Chrome...");
    }

    let profile = match &options.profile_dir {
        Some(dir) => dir.clone(),
        None => default_profile_dir()?,
    };
    std::fs::create_dir_all(&profile)
        .with_context(|| format!("creating Chrome profile at {}", profile.display()))?;

    let launch_options = LaunchOptions {
        headless: options.headless,
        path: options.chrome_path.clone(),
        user_data_dir: Some(profile),
        window_size: Some((1280, 800)),
        args: vec![
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--password-store=basic"),
        ],
        idle_browser_timeout: Duration::from_secs(300),
        ..Default::default()
    };

    info!("[Hands] Starting Chrome...");
    let browser =
        Browser::new(launch_options).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
    let tab = browser.new_tab()?;
    tab.navigate_to("about:blank")?;
    Ok((browser, tab))
}

fn default_profile_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| anyhow!("no local data directory"))?;
    Ok(base.join("screen-pilot").join("chrome-profile"))
}

pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
    id: String,
}

impl ChromeSession {
    fn with_tab<T, F>(&self, f: F) -> impl Future<Output = Result<T, SessionError>> + use<T, F>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        run_on_tab(self.tab.clone(), f)
    }
}

/// Run a blocking tab operation on the blocking pool.
async fn run_on_tab<T, F>(tab: Arc<Tab>, f: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: FnOnce(&Tab) -> Result<T> + Send + 'static,
{
    let value = tokio::task::spawn_blocking(move || f(tab.as_ref()))
        .await
        .map_err(|e| anyhow!("Chrome call panicked: {}", e))??;
    Ok(value)
}

#[async_trait]
impl Session for ChromeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)?;
            tab.wait_for_element("body")?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&mut self) -> Result<Screenshot, SessionError> {
        self.with_tab(|tab| {
            let png =
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
            let viewport = read_viewport(tab)?;
            Ok(Screenshot {
                image_url: format!("data:image/png;base64,{}", STANDARD.encode(png)),
                viewport,
            })
        })
        .await
    }

    async fn click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.with_tab(move |tab| {
            tab.click_point(Point {
                x: at.x as f64,
                y: at.y as f64,
            })?;
            Ok(())
        })
        .await
    }

    async fn double_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.with_tab(move |tab| dispatch_mouse(tab, mouse_clicks(at, MouseButton::Left, 2)))
            .await
    }

    async fn right_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.with_tab(move |tab| dispatch_mouse(tab, mouse_clicks(at, MouseButton::Right, 1)))
            .await
    }

    async fn type_text(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.to_string();
        self.with_tab(move |tab| {
            tab.type_str(&text)?;
            Ok(())
        })
        .await
    }

    async fn hotkey(&mut self, keys: &[String]) -> Result<(), SessionError> {
        let (modifiers, key) = checked_chord(keys)?;
        self.with_tab(move |tab| {
            if modifiers.is_empty() {
                tab.press_key(&key)?;
            } else {
                tab.press_key_with_modifiers(&key, Some(modifiers.as_slice()))?;
            }
            Ok(())
        })
        .await
    }

    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), SessionError> {
        self.with_tab(move |tab| {
            tab.evaluate(&format!("window.scrollBy({dx}, {dy})"), false)?;
            Ok(())
        })
        .await
    }

    async fn drag(&mut self, from: PixelPoint, to: PixelPoint) -> Result<(), SessionError> {
        self.with_tab(move |tab| {
            let script = DRAG_JS
                .replace("$X1", &from.x.to_string())
                .replace("$Y1", &from.y.to_string())
                .replace("$X2", &to.x.to_string())
                .replace("$Y2", &to.y.to_string());
            tab.evaluate(&script, false)?;
            Ok(())
        })
        .await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.with_tab(|tab| {
            tab.close(true)?;
            Ok(())
        })
        .await?;
        info!("[Hands] Chrome session {} closed.", self.id);
        Ok(())
    }
}

fn read_viewport(tab: &Tab) -> Result<Viewport> {
    let result = tab.evaluate("[window.innerWidth, window.innerHeight].join('x')", false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| anyhow!("viewport size unavailable"))?;
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| anyhow!("unexpected viewport size `{raw}`"))?;
    Ok(Viewport {
        width: width.parse()?,
        height: height.parse()?,
    })
}

/// Trusted mouse input: move to the point, then one press/release pair per
/// click, with `click_count` rising so the page sees a real double click.
fn mouse_clicks(at: PixelPoint, button: MouseButton, clicks: u32) -> Vec<DispatchMouseEvent> {
    let event = |kind: DispatchMouseEventTypeOption, button: MouseButton, click_count: u32| {
        DispatchMouseEvent {
            Type: kind,
            x: at.x as f64,
            y: at.y as f64,
            modifiers: None,
            timestamp: None,
            button: Some(button),
            buttons: None,
            click_count: Some(click_count),
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            delta_x: None,
            delta_y: None,
            pointer_Type: None,
        }
    };
    let mut events = vec![event(DispatchMouseEventTypeOption::MouseMoved, MouseButton::None, 0)];
    for count in 1..=clicks {
        events.push(event(DispatchMouseEventTypeOption::MousePressed, button.clone(), count));
        events.push(event(DispatchMouseEventTypeOption::MouseReleased, button.clone(), count));
    }
    events
}

fn dispatch_mouse(tab: &Tab, events: Vec<DispatchMouseEvent>) -> Result<()> {
    for event in events {
        tab.call_method(event)?;
    }
    Ok(())
}

/// One pointer drag from ($X1,$Y1) to ($X2,$Y2), including HTML5 drag events.
const DRAG_JS: &str = r#"
(() => {
  const src = document.elementFromPoint($X1, $Y1);
  const dst = document.elementFromPoint($X2, $Y2);
  if (!src) return false;
  const at = (x, y) => ({ bubbles: true, cancelable: true, view: window, clientX: x, clientY: y });
  src.dispatchEvent(new MouseEvent('mousedown', at($X1, $Y1)));
  const data = new DataTransfer();
  src.dispatchEvent(new DragEvent('dragstart', { ...at($X1, $Y1), dataTransfer: data }));
  const target = dst || document.body;
  target.dispatchEvent(new MouseEvent('mousemove', at($X2, $Y2)));
  target.dispatchEvent(new DragEvent('dragover', { ...at($X2, $Y2), dataTransfer: data }));
  target.dispatchEvent(new DragEvent('drop', { ...at($X2, $Y2), dataTransfer: data }));
  src.dispatchEvent(new DragEvent('dragend', { ...at($X2, $Y2), dataTransfer: data }));
  target.dispatchEvent(new MouseEvent('mouseup', at($X2, $Y2)));
  return true;
})()
"#;

fn modifier_for(key: &str) -> Option<ModifierKey> {
    match key.to_ascii_lowercase().as_str() {
        "control" | "ctrl" => Some(ModifierKey::Ctrl),
        "alt" | "option" => Some(ModifierKey::Alt),
        "shift" => Some(ModifierKey::Shift),
        "meta" | "cmd" | "command" | "super" => Some(ModifierKey::Meta),
        _ => None,
    }
}

/// Named keys Chrome's US layout knows, keyed by lowercase alias.
const NAMED_KEYS: &[(&str, &str)] = &[
    ("enter", "Enter"),
    ("return", "Enter"),
    ("tab", "Tab"),
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("backspace", "Backspace"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("insert", "Insert"),
    ("space", "Space"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("pagedown", "PageDown"),
    ("arrowup", "ArrowUp"),
    ("up", "ArrowUp"),
    ("arrowdown", "ArrowDown"),
    ("down", "ArrowDown"),
    ("arrowleft", "ArrowLeft"),
    ("left", "ArrowLeft"),
    ("arrowright", "ArrowRight"),
    ("right", "ArrowRight"),
    ("f1", "F1"),
    ("f2", "F2"),
    ("f3", "F3"),
    ("f4", "F4"),
    ("f5", "F5"),
    ("f6", "F6"),
    ("f7", "F7"),
    ("f8", "F8"),
    ("f9", "F9"),
    ("f10", "F10"),
    ("f11", "F11"),
    ("f12", "F12"),
];

/// The name `press_key` expects for `key`: single characters as-is, named
/// keys by alias.
fn key_name(key: &str) -> Result<String> {
    let mut chars = key.chars();
    if let (Some(_), None) = (chars.next(), chars.next()) {
        return Ok(key.to_string());
    }
    let lower = key.to_ascii_lowercase();
    NAMED_KEYS
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, name)| name.to_string())
        .ok_or_else(|| anyhow!("unknown key `{key}`"))
}

/// A chord Chrome cannot press is refused like any other backend rejection.
fn checked_chord(keys: &[String]) -> Result<(Vec<ModifierKey>, String), SessionError> {
    split_chord(keys).map_err(|e| SessionError::Rejected {
        status: "invalid_hotkey".to_string(),
        message: Some(e.to_string()),
    })
}

/// Splits a chord into its modifiers and the single key they apply to.
fn split_chord(keys: &[String]) -> Result<(Vec<ModifierKey>, String)> {
    let mut modifiers = Vec::new();
    let mut main = None;
    for key in keys {
        match modifier_for(key) {
            Some(m) => modifiers.push(m),
            None if main.is_none() => main = Some(key.as_str()),
            None => anyhow::bail!("chord has more than one non-modifier key: {:?}", keys),
        }
    }
    // With only modifiers, the last one is pressed while the others are held.
    match main {
        Some(key) => Ok((modifiers, key_name(key)?)),
        None => {
            let last = match modifiers.pop().ok_or_else(|| anyhow!("empty chord"))? {
                ModifierKey::Ctrl => "Control",
                ModifierKey::Alt => "Alt",
                ModifierKey::Shift => "Shift",
                ModifierKey::Meta => "Meta",
            };
            Ok((modifiers, last.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_modifiers_from_main_key() {
        let chord = keys(&["Control", "Shift", "t"]);
        let (mods, key) = split_chord(&chord).unwrap();
        assert_eq!(mods.len(), 2);
        assert_eq!(key, "t");
    }

    #[test]
    fn single_key_has_no_modifiers() {
        let chord = keys(&["Enter"]);
        let (mods, key) = split_chord(&chord).unwrap();
        assert!(mods.is_empty());
        assert_eq!(key, "Enter");
    }

    #[test]
    fn key_aliases_resolve_to_chrome_names() {
        let (mods, key) = split_chord(&keys(&["ctrl", "return"])).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(key, "Enter");
        assert_eq!(split_chord(&keys(&["PageDown"])).unwrap().1, "PageDown");
    }

    #[test]
    fn unknown_key_names_are_refused() {
        assert!(split_chord(&keys(&["Control", "Hyper"])).is_err());
    }

    #[test]
    fn rejects_two_plain_keys() {
        assert!(split_chord(&keys(&["a", "b"])).is_err());
    }

    #[test]
    fn unpressable_chords_are_rejected_before_touching_chrome() {
        let err = checked_chord(&keys(&["a", "b"])).unwrap_err();
        assert!(err.is_rejection());
        assert!(err.to_string().contains("more than one non-modifier"));

        let err = checked_chord(&keys(&["F13"])).unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn double_click_counts_up_to_two() {
        let events = mouse_clicks(PixelPoint { x: 640, y: 200 }, MouseButton::Left, 2);
        let counts: Vec<_> = events.iter().map(|e| e.click_count).collect();
        assert_eq!(counts, vec![Some(0), Some(1), Some(1), Some(2), Some(2)]);
        assert!(events.iter().all(|e| e.x == 640.0 && e.y == 200.0));
    }

    #[test]
    fn right_click_presses_the_right_button() {
        let events = mouse_clicks(PixelPoint { x: 1, y: 2 }, MouseButton::Right, 1);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1].button, Some(MouseButton::Right)));
        assert!(matches!(events[1].Type, DispatchMouseEventTypeOption::MousePressed));
        assert!(matches!(events[2].Type, DispatchMouseEventTypeOption::MouseReleased));
    }

    #[test]
    fn modifier_only_chord_presses_last_modifier() {
        let chord = keys(&["Control", "Shift"]);
        let (mods, key) = split_chord(&chord).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(key, "Shift");

        let (mods, key) = split_chord(&keys(&["ctrl"])).unwrap();
        assert!(mods.is_empty());
        assert_eq!(key, "Control");
    }
}
