//! Headless Chrome screenshot backend.
//!
//! One browser process is launched per batch and shared by every worker.
//! Each capture opens its own tab, so concurrent captures never fight over
//! viewport size or navigation state.

use super::backend::{CaptureError, CaptureParams, ScreenshotBackend, Viewport};
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::time::Duration;

/// Long enough for a full batch of slow card pages.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

pub struct ChromeBackend {
    browser: Browser,
}

impl ChromeBackend {
    /// Launch headless Chrome. Fails when no Chrome/Chromium binary is found.
    pub fn launch() -> Result<Self, CaptureError> {
        let options = LaunchOptions {
            headless: true,
            sandbox: false,
            idle_browser_timeout: IDLE_TIMEOUT,
            ..Default::default()
        };
        let browser = Browser::new(options).map_err(|e| CaptureError::Launch(e.to_string()))?;
        Ok(Self { browser })
    }
}

impl ScreenshotBackend for ChromeBackend {
    fn capture(&self, params: &CaptureParams) -> Result<(), CaptureError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;
        let result = screenshot(&tab, params);
        tab.close(true).ok();
        std::fs::write(&params.output, result?)?;
        Ok(())
    }
}

/// Emulate the card's device metrics, load the page and grab the viewport
/// as PNG bytes.
///
/// The page sees `innerWidth`/`innerHeight` equal to the CSS viewport and
/// `devicePixelRatio` equal to the scale factor, so the screenshot comes out
/// at device-pixel size.
fn screenshot(tab: &Tab, params: &CaptureParams) -> Result<Vec<u8>, CaptureError> {
    let viewport = params.viewport;
    let navigation_error = |e: &dyn std::fmt::Display| CaptureError::Navigation {
        url: params.url.clone(),
        message: e.to_string(),
    };

    tab.call_method(device_metrics(&viewport))
        .map_err(|e| CaptureError::Screenshot(e.to_string()))?;

    tab.navigate_to(&params.url)
        .map_err(|e| navigation_error(&e))?
        .wait_until_navigated()
        .map_err(|e| navigation_error(&e))?;

    tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| CaptureError::Screenshot(e.to_string()))
}

fn device_metrics(viewport: &Viewport) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: viewport.device_scale_factor,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}
