use crate::errors::{AgentError, Result};
use crate::js::{self, LocateQuery};
use crate::structure::RawNode;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;

/// Element rectangle in page coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Which `<option>`s a select-option call targets. Externally tagged so the
/// in-page script sees `{"values": [...]}` etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectCriteria {
    Values(Vec<String>),
    Labels(Vec<String>),
    Indices(Vec<usize>),
}

/// Narrow contract the action set needs from the underlying browser. One
/// driver call per single-element operation; selectors are plain CSS
/// (usually the marker selector produced by the element registry).
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and return the final URL after any redirects.
    async fn navigate(&self, url: &str) -> Result<String>;

    /// Count nodes currently matching `query`.
    async fn count_matches(&self, query: &LocateQuery) -> Result<usize>;

    /// Stamp the marker attribute onto matches, one token per node, and
    /// return the tokens actually consumed.
    async fn stamp_matches(&self, query: &LocateQuery, tokens: &[String]) -> Result<Vec<String>>;

    async fn click(&self, selector: &str) -> Result<()>;
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()>;
    async fn clear_value(&self, selector: &str) -> Result<()>;
    async fn blur(&self, selector: &str) -> Result<()>;
    async fn press(&self, selector: &str, key: &str) -> Result<()>;
    async fn press_global(&self, key: &str) -> Result<()>;

    async fn get_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>>;
    async fn inner_html(&self, selector: &str) -> Result<String>;
    async fn inner_text(&self, selector: &str) -> Result<String>;
    async fn text_content(&self, selector: &str) -> Result<String>;
    async fn input_value(&self, selector: &str) -> Result<String>;
    async fn bounding_box(&self, selector: &str) -> Result<Rect>;
    async fn is_checked(&self, selector: &str) -> Result<bool>;
    async fn is_enabled(&self, selector: &str) -> Result<bool>;
    async fn is_editable(&self, selector: &str) -> Result<bool>;
    async fn is_visible(&self, selector: &str) -> Result<bool>;
    async fn count(&self, selector: &str) -> Result<usize>;

    async fn select_option(
        &self,
        selector: &str,
        criteria: &SelectCriteria,
    ) -> Result<Vec<String>>;

    /// Run a model-supplied page-function body through the browser's own
    /// scripting primitive.
    async fn run_page_function(&self, body: &str) -> Result<Value>;

    /// Raw visible-structure snapshot rooted at the document body.
    async fn snapshot(&self, max_depth: usize) -> Result<RawNode>;
}

/// Chrome implementation over a DevTools tab.
pub struct ChromePage {
    // Dropping the Browser tears the process down, so the page keeps it
    // alive for tabs it launched itself.
    _browser: Option<Browser>,
    tab: Arc<Tab>,
}

#[derive(Deserialize)]
struct ScriptEnvelope {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

impl ChromePage {
    /// Launch a fresh headless Chrome and open one tab.
    pub fn launch(headless: bool) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(headless)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .map_err(|e| AgentError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| AgentError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AgentError::LaunchFailed(e.to_string()))?;

        Ok(Self {
            _browser: Some(browser),
            tab,
        })
    }

    /// Wrap an existing tab owned elsewhere.
    pub fn from_tab(tab: Arc<Tab>) -> Self {
        Self {
            _browser: None,
            tab,
        }
    }

    fn run_script(&self, script: &str) -> Result<Value> {
        // evaluate reports through anyhow; the From impl folds that into
        // JavaScriptFailed.
        let result = self.tab.evaluate(script, false)?;
        let raw = result.value.unwrap_or(Value::Null);
        let text = raw.as_str().ok_or_else(|| {
            AgentError::JavaScriptFailed("script did not return a string payload".to_string())
        })?;
        let envelope: ScriptEnvelope = serde_json::from_str(text)?;
        if envelope.ok {
            Ok(envelope.value)
        } else {
            Err(AgentError::JavaScriptFailed(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    fn run_element_script(&self, selector: &str, script: &str) -> Result<Value> {
        match self.run_script(script) {
            Err(AgentError::JavaScriptFailed(message)) if message == "element not found" => {
                Err(AgentError::ElementNotFound(selector.to_string()))
            }
            other => other,
        }
    }

    fn string_from(&self, selector: &str, script: &str) -> Result<String> {
        let value = self.run_element_script(selector, script)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn bool_from(&self, selector: &str, script: &str) -> Result<bool> {
        let value = self.run_element_script(selector, script)?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<String> {
        let parsed =
            url::Url::parse(url).map_err(|e| AgentError::NavigationFailed(e.to_string()))?;
        self.tab
            .navigate_to(parsed.as_str())
            .map_err(|e| AgentError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AgentError::NavigationFailed(e.to_string()))?;
        Ok(self.tab.get_url())
    }

    async fn count_matches(&self, query: &LocateQuery) -> Result<usize> {
        let value = self.run_script(&js::count_matches(query))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn stamp_matches(&self, query: &LocateQuery, tokens: &[String]) -> Result<Vec<String>> {
        let value = self.run_script(&js::stamp_matches(query, tokens))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.run_element_script(selector, &js::click(selector))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.run_element_script(selector, &js::fill(selector, text))?;
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()> {
        self.run_element_script(selector, &js::set_checked(selector, checked))?;
        Ok(())
    }

    async fn clear_value(&self, selector: &str) -> Result<()> {
        self.run_element_script(selector, &js::clear_value(selector))?;
        Ok(())
    }

    async fn blur(&self, selector: &str) -> Result<()> {
        self.run_element_script(selector, &js::blur(selector))?;
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.run_element_script(selector, &js::focus(selector))?;
        self.tab.press_key(key)?;
        Ok(())
    }

    async fn press_global(&self, key: &str) -> Result<()> {
        self.tab.press_key(key)?;
        Ok(())
    }

    async fn get_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let value = self.run_element_script(selector, &js::get_attribute(selector, attribute))?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn inner_html(&self, selector: &str) -> Result<String> {
        self.string_from(selector, &js::inner_html(selector))
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        self.string_from(selector, &js::inner_text(selector))
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        self.string_from(selector, &js::text_content(selector))
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        self.string_from(selector, &js::input_value(selector))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Rect> {
        let value = self.run_element_script(selector, &js::bounding_box(selector))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn is_checked(&self, selector: &str) -> Result<bool> {
        self.bool_from(selector, &js::is_checked(selector))
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool> {
        self.bool_from(selector, &js::is_enabled(selector))
    }

    async fn is_editable(&self, selector: &str) -> Result<bool> {
        self.bool_from(selector, &js::is_editable(selector))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.bool_from(selector, &js::is_visible(selector))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.run_script(&js::count(selector))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn select_option(
        &self,
        selector: &str,
        criteria: &SelectCriteria,
    ) -> Result<Vec<String>> {
        let criteria_json = serde_json::to_string(criteria)?;
        let value =
            self.run_element_script(selector, &js::select_option(selector, &criteria_json))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn run_page_function(&self, body: &str) -> Result<Value> {
        self.run_script(&js::page_function(body))
    }

    async fn snapshot(&self, max_depth: usize) -> Result<RawNode> {
        let value = self.run_script(&js::snapshot(max_depth))?;
        serde_json::from_value(value)
            .map_err(|e| AgentError::StructureExtractionFailed(e.to_string()))
    }
}
