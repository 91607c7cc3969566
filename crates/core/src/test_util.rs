//! Mock driver and fixtures shared by the unit tests

use crate::driver::BrowserDriver;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted stand-in for the browser driver.
///
/// Capture and evaluation results are queued up front; an unqueued capture
/// yields a valid default PNG so pacing tests can loop freely. When
/// `focus_editable` is on, evaluation simulates a focused input by parsing
/// the text literal out of the append script, which lets tests observe the
/// cumulative-append contract end to end.
#[derive(Default)]
pub(crate) struct MockDriver {
    captures: Mutex<VecDeque<Result<Vec<u8>>>>,
    evals: Mutex<VecDeque<Value>>,
    evaluated: Mutex<Vec<String>>,
    editable: Mutex<Option<String>>,
}

impl MockDriver {
    pub fn push_capture(&self, result: Result<Vec<u8>>) {
        self.captures.lock().unwrap().push_back(result);
    }

    pub fn push_eval(&self, value: Value) {
        self.evals.lock().unwrap().push_back(value);
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().unwrap().clone()
    }

    /// Simulate an empty focused input element
    pub fn focus_editable(&self) {
        *self.editable.lock().unwrap() = Some(String::new());
    }

    /// Current value of the simulated input, if focused
    pub fn editable_value(&self) -> Option<String> {
        self.editable.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn capture_surface(&self) -> Result<Vec<u8>> {
        match self.captures.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(rgba_png(8, 6)),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.evaluated.lock().unwrap().push(expression.to_string());

        if expression.contains("document.activeElement") {
            let mut editable = self.editable.lock().unwrap();
            return Ok(match editable.as_mut() {
                Some(value) => {
                    value.push_str(&extract_text_literal(expression));
                    json!(true)
                }
                None => json!(false),
            });
        }

        Ok(self
            .evals
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Value::Null))
    }

    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

/// Pull the JSON string literal back out of an append script
fn extract_text_literal(script: &str) -> String {
    script
        .lines()
        .find_map(|line| line.trim().strip_prefix("const text = "))
        .and_then(|rest| rest.strip_suffix(';'))
        .and_then(|literal| serde_json::from_str(literal).ok())
        .unwrap_or_default()
}

/// A small valid RGBA PNG with blue fixed at 0x40 and opaque alpha
pub(crate) fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8, y as u8, 0x40, 0xff])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}
