//! Remote interaction command dispatch

use crate::driver::DriverSlot;
use crate::error::{Error, Result};
use crate::policy::AllowListPolicy;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Wire shape of one remote interaction command
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Type tag: `click`, `type`, or `scroll`
    pub command: String,
    /// Handler-specific parameters
    #[serde(default)]
    pub params: Value,
}

/// Result of executing one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The handler ran; `true` means the in-page action was performed
    Completed(bool),
    /// The type tag was not recognized; no page interaction happened
    UnknownCommand,
}

#[derive(Debug, Deserialize)]
struct ClickParams {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrollParams {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TypeParams {
    text: String,
}

/// What the inspect script found under the click point
#[derive(Debug, Deserialize)]
struct ElementProbe {
    found: bool,
    href: Option<String>,
}

/// Validates and executes remote interaction commands against the live page.
///
/// Routing is by the command's type tag; an unrecognized tag degrades to an
/// explicit [`CommandOutcome::UnknownCommand`] instead of an error so that
/// protocol evolution on the remote side cannot crash the session. Script
/// failures surface as [`Error::Command`] and never reach the signaling
/// layer. The dispatcher assumes at most one in-flight command per session;
/// driver access is serialized by the driver itself.
pub struct CommandDispatcher {
    driver: DriverSlot,
    policy: AllowListPolicy,
}

impl CommandDispatcher {
    pub fn new(driver: DriverSlot, policy: AllowListPolicy) -> Self {
        Self { driver, policy }
    }

    /// The active navigation policy
    pub fn policy(&self) -> &AllowListPolicy {
        &self.policy
    }

    /// Route `request` by its type tag and execute it
    pub async fn execute(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        match request.command.as_str() {
            "click" => self.click(&request.params).await,
            "type" => self.type_text(&request.params).await,
            "scroll" => self.scroll(&request.params).await,
            other => {
                debug!("unrecognized command tag {:?}", other);
                Ok(CommandOutcome::UnknownCommand)
            }
        }
    }

    /// Click the topmost element at viewport coordinates.
    ///
    /// When the element or an ancestor is an anchor, its destination
    /// hostname must pass the allow-list before the activation is
    /// dispatched; a disallowed or unparseable target returns `false`
    /// without touching the page again.
    async fn click(&self, params: &Value) -> Result<CommandOutcome> {
        let ClickParams { x, y } = parse_params(params)?;
        let driver = self.driver.get().await?;

        let probe = driver.evaluate(&inspect_script(x, y)).await?;
        let probe: ElementProbe = serde_json::from_value(probe)
            .map_err(|e| Error::Command(format!("unexpected inspect result: {}", e)))?;

        if !probe.found {
            return Ok(CommandOutcome::Completed(false));
        }
        if let Some(href) = probe.href.as_deref() {
            let allowed = target_hostname(href)
                .map(|host| self.policy.allows(&host))
                .unwrap_or(false);
            if !allowed {
                warn!("blocked click on {:?}: target not in allow-list", href);
                return Ok(CommandOutcome::Completed(false));
            }
        }

        let clicked = driver.evaluate(&activate_script(x, y)).await?;
        Ok(CommandOutcome::Completed(clicked.as_bool().unwrap_or(false)))
    }

    /// Append text to the focused editable element, if any
    async fn type_text(&self, params: &Value) -> Result<CommandOutcome> {
        let TypeParams { text } = parse_params(params)?;
        let driver = self.driver.get().await?;
        let typed = driver.evaluate(&append_script(&text)).await?;
        Ok(CommandOutcome::Completed(typed.as_bool().unwrap_or(false)))
    }

    /// Scroll the viewport by a relative offset
    async fn scroll(&self, params: &Value) -> Result<CommandOutcome> {
        let ScrollParams { x, y } = parse_params(params)?;
        let driver = self.driver.get().await?;
        let scrolled = driver.evaluate(&scroll_script(x, y)).await?;
        Ok(CommandOutcome::Completed(scrolled.as_bool().unwrap_or(false)))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T> {
    let value = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| Error::Command(format!("invalid parameters: {}", e)))
}

/// Hostname of a click target, if the href parses to one
fn target_hostname(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    url.host_str().map(|h| h.to_string())
}

fn inspect_script(x: f64, y: f64) -> String {
    format!(
        r#"(() => {{
  const el = document.elementFromPoint({x}, {y});
  if (!el) {{ return {{ found: false, href: null }}; }}
  const anchor = el.closest('a[href]');
  return {{ found: true, href: anchor ? anchor.href : null }};
}})()"#
    )
}

fn activate_script(x: f64, y: f64) -> String {
    format!(
        r#"(() => {{
  const el = document.elementFromPoint({x}, {y});
  if (!el) {{ return false; }}
  el.click();
  return true;
}})()"#
    )
}

fn append_script(text: &str) -> String {
    let literal = serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""));
    format!(
        r#"(() => {{
  const el = document.activeElement;
  if (!el) {{ return false; }}
  const text = {literal};
  if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {{
    el.value = el.value + text;
    return true;
  }}
  if (el.isContentEditable) {{
    el.textContent = el.textContent + text;
    return true;
  }}
  return false;
}})()"#
    )
}

fn scroll_script(dx: f64, dy: f64) -> String {
    format!("(() => {{ window.scrollBy({dx}, {dy}); return true; }})()")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockDriver;
    use serde_json::json;
    use std::sync::Arc;

    fn dispatcher_with(driver: Arc<MockDriver>) -> CommandDispatcher {
        CommandDispatcher::new(
            DriverSlot::with_driver(driver),
            AllowListPolicy::default(),
        )
    }

    fn request(command: &str, params: Value) -> CommandRequest {
        CommandRequest {
            command: command.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_unknown_command_is_an_explicit_result() {
        // No driver installed: an unknown tag must not need one.
        let dispatcher =
            CommandDispatcher::new(DriverSlot::empty(), AllowListPolicy::default());
        let outcome = dispatcher
            .execute(&request("reboot", json!({})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::UnknownCommand);
    }

    #[tokio::test]
    async fn test_click_without_driver_is_unavailable() {
        let dispatcher =
            CommandDispatcher::new(DriverSlot::empty(), AllowListPolicy::default());
        let err = dispatcher
            .execute(&request("click", json!({"x": 1, "y": 2})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DriverUnavailable));
    }

    #[tokio::test]
    async fn test_click_requires_coordinates() {
        let driver = Arc::new(MockDriver::default());
        let dispatcher = dispatcher_with(driver.clone());
        let err = dispatcher
            .execute(&request("click", json!({"x": 10})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(driver.evaluated().is_empty());
    }

    #[tokio::test]
    async fn test_click_with_no_element_returns_false() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": false, "href": null}));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 5, "y": 5})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(false));
        assert_eq!(driver.evaluated().len(), 1);
    }

    #[tokio::test]
    async fn test_click_on_disallowed_anchor_is_blocked() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": true, "href": "https://gitlab.com/project"}));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 5, "y": 5})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(false));
        // The activation script never ran.
        assert_eq!(driver.evaluated().len(), 1);
    }

    #[tokio::test]
    async fn test_click_on_lookalike_hostname_is_blocked() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": true, "href": "https://google.com.evil.example/"}));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 5, "y": 5})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(false));
    }

    #[tokio::test]
    async fn test_click_on_unparseable_target_is_blocked() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": true, "href": "javascript:void(0)"}));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 5, "y": 5})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(false));
        assert_eq!(driver.evaluated().len(), 1);
    }

    #[tokio::test]
    async fn test_click_on_allowed_anchor_activates() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": true, "href": "https://github.com/pagecast"}));
        driver.push_eval(json!(true));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 5, "y": 5})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(true));
        assert_eq!(driver.evaluated().len(), 2);
        assert!(driver.evaluated()[1].contains("el.click()"));
    }

    #[tokio::test]
    async fn test_click_on_plain_element_skips_policy() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!({"found": true, "href": null}));
        driver.push_eval(json!(true));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("click", json!({"x": 30, "y": 40})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(true));
    }

    #[tokio::test]
    async fn test_type_appends_cumulatively() {
        let driver = Arc::new(MockDriver::default());
        driver.focus_editable();
        let dispatcher = dispatcher_with(driver.clone());

        let req = request("type", json!({"text": "abc"}));
        assert_eq!(
            dispatcher.execute(&req).await.unwrap(),
            CommandOutcome::Completed(true)
        );
        assert_eq!(driver.editable_value(), Some("abc".to_string()));

        assert_eq!(
            dispatcher.execute(&req).await.unwrap(),
            CommandOutcome::Completed(true)
        );
        assert_eq!(driver.editable_value(), Some("abcabc".to_string()));
    }

    #[tokio::test]
    async fn test_type_without_focused_editable_returns_false() {
        let driver = Arc::new(MockDriver::default());
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("type", json!({"text": "abc"})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(false));
    }

    #[tokio::test]
    async fn test_type_embeds_text_as_json_literal() {
        let driver = Arc::new(MockDriver::default());
        driver.focus_editable();
        let dispatcher = dispatcher_with(driver.clone());

        let text = "ab\"c</script>\n";
        dispatcher
            .execute(&request("type", json!({ "text": text })))
            .await
            .unwrap();
        let script = driver.evaluated().pop().unwrap();
        assert!(script.contains(&serde_json::to_string(text).unwrap()));
    }

    #[tokio::test]
    async fn test_scroll_defaults_to_zero_offsets() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!(true));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("scroll", Value::Null))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(true));
        assert!(driver.evaluated()[0].contains("scrollBy(0, 0)"));
    }

    #[tokio::test]
    async fn test_scroll_passes_offsets_through() {
        let driver = Arc::new(MockDriver::default());
        driver.push_eval(json!(true));
        let dispatcher = dispatcher_with(driver.clone());

        let outcome = dispatcher
            .execute(&request("scroll", json!({"x": 5, "y": -120})))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed(true));
        assert!(driver.evaluated()[0].contains("scrollBy(5, -120)"));
    }

    #[test]
    fn test_target_hostname() {
        assert_eq!(
            target_hostname("https://www.google.com/search?q=a"),
            Some("www.google.com".to_string())
        );
        assert_eq!(target_hostname("javascript:void(0)"), None);
        assert_eq!(target_hostname("not a url"), None);
    }
}
