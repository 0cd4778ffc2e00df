//! Command registry
//!
//! Every command a script may use is listed in a static table. Parsed
//! commands are validated against it into a typed [`Action`] before the run
//! starts, so an unknown name or a wrong argument count fails at load time.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::RunContext;
use super::parser::Command;
use super::waiter::await_element;
use crate::common::{Error, Result};
use crate::driver::{NodeRef, UiDriver};

/// Tag of the label elements inside on-screen keyboard keys
const KEY_LABEL_TAG: &str = "span";

/// Map entry (and `alt` text) of the on-screen shift key
const SHIFT_KEY: &str = "shift";

/// Class token substring that marks a focused element
const FOCUS_MARKER: &str = "focus";

/// Information about a script command
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Name used in scripts
    pub name: &'static str,
    /// Other accepted names
    pub aliases: &'static [&'static str],
    /// Argument names, in order
    pub args: &'static [&'static str],
    /// Whether executing it records an outcome
    pub reported: bool,
    /// Normally injected by the engine rather than written in scripts
    pub synthetic: bool,
    /// Brief description
    pub description: &'static str,
}

/// All available commands
static COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "waitForElement",
        aliases: &[],
        args: &["selector"],
        reported: true,
        synthetic: false,
        description: "Wait until an element matches the selector",
    },
    CommandInfo {
        name: "click",
        aliases: &[],
        args: &["selector"],
        reported: true,
        synthetic: false,
        description: "Click an element",
    },
    CommandInfo {
        name: "type",
        aliases: &[],
        args: &["selector", "text"],
        reported: true,
        synthetic: false,
        description: "Set the value of an element",
    },
    CommandInfo {
        name: "typeWithKeyboard",
        aliases: &[],
        args: &["selector", "text"],
        reported: true,
        synthetic: false,
        description: "Type text by clicking the keys of an on-screen keyboard",
    },
    CommandInfo {
        name: "keyPress",
        aliases: &[],
        args: &["key"],
        reported: true,
        synthetic: false,
        description: "Dispatch a key-down for a key from the key map",
    },
    CommandInfo {
        name: "assertEquals",
        aliases: &["asserts"],
        args: &["selector", "expected"],
        reported: true,
        synthetic: false,
        description: "Check that an element's value equals the expected text",
    },
    CommandInfo {
        name: "wait",
        aliases: &[],
        args: &["ms"],
        reported: false,
        synthetic: false,
        description: "Pause for a number of milliseconds",
    },
    CommandInfo {
        name: "checkFocus",
        aliases: &[],
        args: &["key"],
        reported: false,
        synthetic: true,
        description: "Abort the run if no element in the document carries a focus class",
    },
    CommandInfo {
        name: "beaconStart",
        aliases: &[],
        args: &[],
        reported: true,
        synthetic: false,
        description: "Restart the report and its timer",
    },
    CommandInfo {
        name: "generateReport",
        aliases: &[],
        args: &[],
        reported: false,
        synthetic: false,
        description: "Finish the report now; later commands are not recorded",
    },
];

/// Get all available commands
pub fn all_commands() -> &'static [CommandInfo] {
    COMMANDS
}

/// Find a command by name or alias
pub fn find_command(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS
        .iter()
        .find(|c| c.name == name || c.aliases.contains(&name))
}

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    WaitForElement { selector: String },
    Click { selector: String },
    Type { selector: String, text: String },
    TypeWithKeyboard { selector: String, text: String },
    KeyPress { key: String },
    AssertEquals { selector: String, expected: String },
    Wait { ms: u64 },
    CheckFocus { key: String },
    BeaconStart,
    GenerateReport,
}

impl Action {
    /// Validate a parsed command against the registry
    pub fn resolve(command: &Command) -> Result<Self> {
        let info = find_command(&command.name)
            .ok_or_else(|| Error::UnknownCommand(command.name.clone()))?;

        if command.args.len() != info.args.len() {
            return Err(Error::invalid_arguments(
                info.name,
                &format!(
                    "expected {} argument(s) ({}), got {}",
                    info.args.len(),
                    info.args.join(", "),
                    command.args.len()
                ),
            ));
        }

        let arg = |i: usize| command.args[i].clone();

        let action = match info.name {
            "waitForElement" => Action::WaitForElement { selector: arg(0) },
            "click" => Action::Click { selector: arg(0) },
            "type" => Action::Type {
                selector: arg(0),
                text: arg(1),
            },
            "typeWithKeyboard" => Action::TypeWithKeyboard {
                selector: arg(0),
                text: arg(1),
            },
            "keyPress" => Action::KeyPress { key: arg(0) },
            "assertEquals" => Action::AssertEquals {
                selector: arg(0),
                expected: arg(1),
            },
            "wait" => {
                let ms = command.args[0].parse().map_err(|_| {
                    Error::invalid_arguments(
                        info.name,
                        &format!("'{}' is not a number of milliseconds", command.args[0]),
                    )
                })?;
                Action::Wait { ms }
            }
            "checkFocus" => Action::CheckFocus { key: arg(0) },
            "beaconStart" => Action::BeaconStart,
            "generateReport" => Action::GenerateReport,
            other => return Err(Error::Internal(format!("unhandled command '{}'", other))),
        };

        Ok(action)
    }

    /// Canonical command name
    pub fn name(&self) -> &'static str {
        match self {
            Action::WaitForElement { .. } => "waitForElement",
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::TypeWithKeyboard { .. } => "typeWithKeyboard",
            Action::KeyPress { .. } => "keyPress",
            Action::AssertEquals { .. } => "assertEquals",
            Action::Wait { .. } => "wait",
            Action::CheckFocus { .. } => "checkFocus",
            Action::BeaconStart => "beaconStart",
            Action::GenerateReport => "generateReport",
        }
    }

    /// Whether executing this action records an outcome
    pub fn is_reported(&self) -> bool {
        find_command(self.name()).is_some_and(|info| info.reported)
    }
}

/// Executes actions against a UI driver
#[derive(Clone)]
pub struct CommandRegistry {
    driver: Arc<dyn UiDriver>,
}

impl CommandRegistry {
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &dyn UiDriver {
        self.driver.as_ref()
    }

    /// Execute one action, returning its success message
    pub async fn execute(&self, action: &Action, ctx: &mut RunContext) -> Result<String> {
        match action {
            Action::WaitForElement { selector } => {
                self.element(selector, ctx).await?;
                Ok(format!("Waited for {}", selector))
            }
            Action::Click { selector } => {
                let node = self.element(selector, ctx).await?;
                self.driver.activate(node).await?;
                Ok(format!("Clicked on {}", selector))
            }
            Action::Type { selector, text } => {
                let node = self.element(selector, ctx).await?;
                self.driver.set_value(node, text).await?;
                Ok(format!("Typed {} into {}", text, selector))
            }
            Action::TypeWithKeyboard { selector, text } => {
                self.type_with_keyboard(selector, text, ctx).await
            }
            Action::KeyPress { key } => self.key_press(key, ctx).await,
            Action::AssertEquals { selector, expected } => {
                let node = self.element(selector, ctx).await?;
                let actual = self.driver.value(node).await?;
                if &actual == expected {
                    Ok(format!("Value in {} matches {}", selector, expected))
                } else {
                    Err(Error::AssertionMismatch {
                        selector: selector.clone(),
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            Action::Wait { ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
                Ok(format!("Waited for {} ms", ms))
            }
            Action::CheckFocus { key } => self.check_focus(key).await,
            Action::BeaconStart => {
                ctx.begin_report();
                Ok("Beacon started".to_string())
            }
            Action::GenerateReport => {
                ctx.finish_report();
                Ok("Report generated".to_string())
            }
        }
    }

    async fn element(&self, selector: &str, ctx: &RunContext) -> Result<NodeRef> {
        await_element(self.driver.as_ref(), selector, ctx.timeout).await
    }

    async fn key_press(&self, key: &str, ctx: &RunContext) -> Result<String> {
        let code = *ctx
            .key_map
            .get(key)
            .ok_or_else(|| Error::key_dispatch_failed(key, "no key code in the key map"))?;

        match self.driver.dispatch_key_down(code).await {
            Ok(true) => Ok(format!("Pressed {}", key)),
            Ok(false) => Err(Error::key_dispatch_failed(key, "the document cancelled the key-down")),
            Err(e) => Err(Error::key_dispatch_failed(key, &e.to_string())),
        }
    }

    async fn check_focus(&self, key: &str) -> Result<String> {
        for node in self.driver.query_selector_all("*").await? {
            let classes = self.driver.class_names(node).await?;
            if classes.iter().any(|c| c.contains(FOCUS_MARKER)) {
                return Ok(format!("Focus OK after {}", key));
            }
        }
        Err(Error::FocusLost {
            key: key.to_string(),
        })
    }

    async fn type_with_keyboard(
        &self,
        selector: &str,
        text: &str,
        ctx: &RunContext,
    ) -> Result<String> {
        let container = self.element(selector, ctx).await?;
        let keys = self.keyboard_layout(container).await?;

        let lookup = |glyph: &str| {
            keys.get(glyph).copied().ok_or_else(|| Error::UnknownKeyGlyph {
                selector: selector.to_string(),
                glyph: glyph.to_string(),
            })
        };

        // Resolve every key first so a missing glyph clicks nothing
        let mut presses = Vec::new();
        for ch in text.chars() {
            if ch.is_uppercase() {
                presses.push(lookup(SHIFT_KEY)?);
            }
            let glyph: String = ch.to_lowercase().collect();
            presses.push(lookup(&glyph)?);
        }

        for key in presses {
            self.driver.activate(key).await?;
        }

        Ok(format!("Typed {} using on-screen keyboard", text))
    }

    /// Map each glyph of an on-screen keyboard to its clickable key
    ///
    /// A key is the parent of a label `span`. Labels with text map their
    /// lowercased text; an empty label marks the shift key when one of the
    /// key's children has `alt="shift"`.
    async fn keyboard_layout(&self, container: NodeRef) -> Result<HashMap<String, NodeRef>> {
        let mut keys = HashMap::new();

        for label in self.driver.elements_by_tag(container, KEY_LABEL_TAG).await? {
            let Some(key) = self.driver.parent(label).await? else {
                continue;
            };

            let glyph = self.driver.text(label).await?;
            if !glyph.is_empty() {
                keys.insert(glyph.to_lowercase(), key);
                continue;
            }

            for child in self.driver.children(key).await? {
                let alt = self.driver.attribute(child, "alt").await?;
                if alt.is_some_and(|a| a.eq_ignore_ascii_case(SHIFT_KEY)) {
                    keys.insert(SHIFT_KEY.to_string(), key);
                }
            }
        }

        tracing::debug!(keys = keys.len(), "Scanned on-screen keyboard");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::RunnerConfig;
    use crate::driver::fixture::{Change, Effect, ElementSpec, Page};
    use crate::driver::MemoryDocument;
    use crate::runner::parser::parse;
    use std::time::Duration;

    fn resolve(text: &str) -> Result<Action> {
        Action::resolve(&parse(text).unwrap())
    }

    fn key(label: &str) -> ElementSpec {
        ElementSpec::new("div")
            .class("key")
            .id(&format!("key-{}", label))
            .child(ElementSpec::new("span").text(label))
    }

    fn keyboard_page() -> Page {
        Page {
            body: vec![ElementSpec::new("div")
                .id("keyboard")
                .child(key("a"))
                .child(key("B"))
                .child(
                    ElementSpec::new("div")
                        .class("key")
                        .id("key-shift")
                        .child(ElementSpec::new("img").attr("alt", "shift"))
                        .child(ElementSpec::new("span")),
                )],
            ..Page::default()
        }
    }

    fn setup(page: &Page) -> (MemoryDocument, CommandRegistry, RunContext) {
        let doc = MemoryDocument::from_page(page);
        let registry = CommandRegistry::new(Arc::new(doc.clone()));
        let config = RunnerConfig {
            key_map: HashMap::from([("down".to_string(), 40), ("esc".to_string(), 27)]),
            timeout: 50,
            ..RunnerConfig::default()
        };
        (doc, registry, RunContext::new(&config))
    }

    #[test]
    fn test_resolve_commands() {
        assert_eq!(
            resolve("click(#go)").unwrap(),
            Action::Click {
                selector: "#go".to_string()
            }
        );
        assert_eq!(resolve("wait(250)").unwrap(), Action::Wait { ms: 250 });
        assert_eq!(resolve("beaconStart()").unwrap(), Action::BeaconStart);
        assert!(matches!(
            resolve("asserts(#status,ready)").unwrap(),
            Action::AssertEquals { .. }
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_commands() {
        assert!(matches!(resolve("hover(#go)"), Err(Error::UnknownCommand(name)) if name == "hover"));
        assert!(matches!(resolve("click()"), Err(Error::InvalidArguments { .. })));
        assert!(matches!(resolve("type(#field)"), Err(Error::InvalidArguments { .. })));
        assert!(matches!(resolve("wait(soon)"), Err(Error::InvalidArguments { .. })));
    }

    #[test]
    fn test_reported_flags() {
        assert!(Action::Click { selector: "#a".into() }.is_reported());
        assert!(!Action::Wait { ms: 1 }.is_reported());
        assert!(!Action::CheckFocus { key: "down".into() }.is_reported());
    }

    #[test]
    fn test_every_command_resolves() {
        for info in all_commands() {
            let args: Vec<String> = info.args.iter().map(|_| "1".to_string()).collect();
            let action = Action::resolve(&Command::new(info.name, args)).unwrap();
            assert_eq!(action.name(), info.name);
        }
    }

    #[tokio::test]
    async fn test_type_with_keyboard_clicks_shift_first() {
        let (doc, registry, mut ctx) = setup(&keyboard_page());

        let message = registry
            .execute(
                &Action::TypeWithKeyboard {
                    selector: "#keyboard".to_string(),
                    text: "Ab".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap();

        assert_eq!(message, "Typed Ab using on-screen keyboard");
        let expected = vec![
            doc.find("#key-shift").unwrap(),
            doc.find("#key-a").unwrap(),
            doc.find("#key-B").unwrap(),
        ];
        assert_eq!(doc.activations(), expected);
    }

    #[tokio::test]
    async fn test_type_with_keyboard_unknown_glyph_clicks_nothing() {
        let (doc, registry, mut ctx) = setup(&keyboard_page());

        let err = registry
            .execute(
                &Action::TypeWithKeyboard {
                    selector: "#keyboard".to_string(),
                    text: "abc".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownKeyGlyph { glyph, .. } if glyph == "c"));
        assert!(doc.activations().is_empty());
    }

    #[tokio::test]
    async fn test_click_missing_element() {
        let (_doc, registry, mut ctx) = setup(&Page::default());
        let err = registry
            .execute(
                &Action::Click {
                    selector: "#missing".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_type_and_assert() {
        let page = Page {
            body: vec![ElementSpec::new("input").id("field")],
            ..Page::default()
        };
        let (_doc, registry, mut ctx) = setup(&page);

        registry
            .execute(
                &Action::Type {
                    selector: "#field".to_string(),
                    text: "hello".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap();

        let ok = registry
            .execute(
                &Action::AssertEquals {
                    selector: "#field".to_string(),
                    expected: "hello".to_string(),
                },
                &mut ctx,
            )
            .await;
        assert_eq!(ok.unwrap(), "Value in #field matches hello");

        let err = registry
            .execute(
                &Action::AssertEquals {
                    selector: "#field".to_string(),
                    expected: "bye".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssertionMismatch { actual, .. } if actual == "hello"));
    }

    #[tokio::test]
    async fn test_key_press() {
        let page = Page {
            prevent_default: vec![27],
            ..Page::default()
        };
        let (doc, registry, mut ctx) = setup(&page);

        let pressed = registry
            .execute(&Action::KeyPress { key: "down".to_string() }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(pressed, "Pressed down");

        let cancelled = registry
            .execute(&Action::KeyPress { key: "esc".to_string() }, &mut ctx)
            .await;
        assert!(matches!(cancelled, Err(Error::KeyDispatchFailed { .. })));

        let unknown = registry
            .execute(&Action::KeyPress { key: "f13".to_string() }, &mut ctx)
            .await;
        assert!(matches!(unknown, Err(Error::KeyDispatchFailed { .. })));

        assert_eq!(doc.key_downs(), vec![40, 27]);
    }

    #[tokio::test]
    async fn test_check_focus() {
        let page = Page {
            body: vec![ElementSpec::new("div").id("menu").class("menu")],
            ..Page::default()
        };
        let (doc, registry, mut ctx) = setup(&page);
        let check = Action::CheckFocus {
            key: "down".to_string(),
        };

        let lost = registry.execute(&check, &mut ctx).await.unwrap_err();
        assert!(lost.is_abort());

        doc.apply(&Effect::new(
            "#menu",
            Change::AddClass {
                class: "item--focused".to_string(),
            },
        ))
        .unwrap();
        let ok = registry.execute(&check, &mut ctx).await.unwrap();
        assert_eq!(ok, "Focus OK after down");
    }

    #[tokio::test]
    async fn test_wait_for_late_element() {
        let page = Page {
            body: vec![ElementSpec::new("button").id("load").on_click(
                Effect::new(
                    "body",
                    Change::Append {
                        element: ElementSpec::new("p").id("loaded"),
                    },
                )
                .after_ms(10),
            )],
            ..Page::default()
        };
        let (_doc, registry, mut ctx) = setup(&page);
        ctx.timeout = Duration::from_secs(2);

        registry
            .execute(&Action::Click { selector: "#load".to_string() }, &mut ctx)
            .await
            .unwrap();
        let waited = registry
            .execute(
                &Action::WaitForElement {
                    selector: "#loaded".to_string(),
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(waited, "Waited for #loaded");
    }
}
