//! Interactive reconfiguration
//!
//! Modules are reconfigured strictly one after another: each module's items
//! are handed to the [`Prompter`], and the next module is only prompted once
//! the previous answers are back. Answers arrive flat (`"bus.port": 1`); a
//! module whose answers differ from what it currently holds gets them merged
//! into its config file, other modules are not rewritten.

use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use xcraft_overlay::{lookup, FieldDef, ModuleConfig};

use crate::error::{EtcError, Result};
use crate::schema::{load_modules, ModuleFilter};
use crate::store::EtcStore;

/// Flat answers keyed by dotted field name.
pub type Answers = Map<String, Value>;

/// A field as presented to the user: its default is the value currently
/// configured for the module, falling back to the schema default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardItem {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Prompt metadata carried over from the schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WizardItem {
    /// Item for `field`, presenting the value found at its path in
    /// `current` when there is one.
    pub fn from_field(field: &FieldDef, current: Option<&ModuleConfig>) -> Self {
        let default = current
            .and_then(|config| lookup(config, &field.name))
            .cloned()
            .or_else(|| field.default.clone());

        Self {
            name: field.name.clone(),
            default,
            extra: field.extra.clone(),
        }
    }
}

/// The external collaborator that renders prompts and collects answers.
pub trait Prompter {
    /// Present one module's items and return the answers.
    fn prompt(&mut self, module: &str, items: &[WizardItem]) -> io::Result<Answers>;

    /// Called once after the last module.
    fn finish(&mut self) {}
}

impl<F> Prompter for F
where
    F: FnMut(&str, &[WizardItem]) -> io::Result<Answers>,
{
    fn prompt(&mut self, module: &str, items: &[WizardItem]) -> io::Result<Answers> {
        self(module, items)
    }
}

/// One module's pending reconfiguration.
#[derive(Debug, Clone)]
pub struct ModuleWizard {
    pub module: String,
    pub items: Vec<WizardItem>,
    /// Values the module is expected to hold, by dotted name.
    pub expected: Map<String, Value>,
}

impl ModuleWizard {
    pub fn new(module: impl Into<String>, items: Vec<WizardItem>) -> Self {
        let expected = items
            .iter()
            .filter_map(|item| item.default.clone().map(|d| (item.name.clone(), d)))
            .collect();

        Self {
            module: module.into(),
            items,
            expected,
        }
    }

    /// Compare answers with the expected values, record the new ones and
    /// return the names that changed, in answer order.
    pub fn apply(&mut self, answers: &Answers) -> Vec<String> {
        let mut changed = Vec::new();

        for (name, answer) in answers {
            if differs(self.expected.get(name), answer) {
                self.expected.insert(name.clone(), answer.clone());
                changed.push(name.clone());
            }
        }

        changed
    }
}

/// What happened to one module during reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleOutcome {
    pub module: String,
    pub changed: Vec<String>,
    pub written: bool,
}

/// Result of [`EtcStore::configure_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconfigureReport {
    pub modules: Vec<ModuleOutcome>,
}

impl ReconfigureReport {
    pub fn written(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .filter(|m| m.written)
            .map(|m| m.module.as_str())
    }
}

/// A reconfiguration session over a set of modules.
#[derive(Debug, Clone)]
pub struct Reconfiguration {
    wizards: Vec<ModuleWizard>,
}

impl Reconfiguration {
    /// Discover modules and seed each item with the currently persisted
    /// value. Modules without a loadable schema are skipped; a missing or
    /// unreadable config leaves the schema defaults in place.
    pub fn prepare(store: &EtcStore, modules_root: &Path, filter: &ModuleFilter) -> Self {
        let wizards = load_modules(modules_root, filter)
            .into_iter()
            .map(|module| {
                let current = store.read(&module.name);
                let items = module
                    .fields
                    .iter()
                    .map(|field| WizardItem::from_field(field, current.as_ref()))
                    .collect();
                ModuleWizard::new(module.name, items)
            })
            .collect();

        Self { wizards }
    }

    pub fn wizards(&self) -> &[ModuleWizard] {
        &self.wizards
    }

    /// Prompt every module in order, persist changed ones, then signal the
    /// end of the session with [`Prompter::finish`].
    pub fn run(
        mut self,
        store: &mut EtcStore,
        prompter: &mut dyn Prompter,
    ) -> Result<ReconfigureReport> {
        let mut report = ReconfigureReport::default();

        for wizard in &mut self.wizards {
            info!(module = %wizard.module, "configuring module");

            let answers = prompter
                .prompt(&wizard.module, &wizard.items)
                .map_err(|e| EtcError::Prompt {
                    module: wizard.module.clone(),
                    source: e,
                })?;
            debug!(
                module = %wizard.module,
                answers = %serde_json::Value::Object(answers.clone()),
                "answers"
            );

            let changed = wizard.apply(&answers);
            let written = !changed.is_empty();
            if written {
                store.merge_flat_config(&wizard.module, &answers)?;
            }

            report.modules.push(ModuleOutcome {
                module: wizard.module.clone(),
                changed,
                written,
            });
        }

        prompter.finish();
        Ok(report)
    }
}

/// Whether an answer differs from the expected value.
///
/// Arrays compare by their comma-joined rendering, numbers by numeric value,
/// everything else structurally. A missing expectation always differs.
fn differs(expected: Option<&Value>, answer: &Value) -> bool {
    match (expected, answer) {
        (None, _) => true,
        (Some(Value::Array(expected)), Value::Array(answer)) => join(expected) != join(answer),
        (Some(Value::Array(_)), _) => true,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() != b.as_f64(),
        (Some(expected), answer) => expected != answer,
    }
}

fn join(items: &[Value]) -> String {
    items.iter().map(render).collect::<Vec<_>>().join(",")
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => join(items),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
