use std::collections::HashMap;

use crate::common::{ControlDirection, ControlType};
use crate::values::Value;

/// A control referenced by a block, with how the block uses it.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeControl {
    pub name: String,
    pub kind: ControlType,
    /// Slot the generated code reads and writes. Assigned in order of first reference.
    pub index: usize,
    pub direction: ControlDirection,
}

/// Variables and controls visible while generating one block.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    values: HashMap<String, Value>,
    controls: Vec<ScopeControl>,
    control_lookup: HashMap<(String, ControlType), usize>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// The control named `name` of kind `kind`, registering it on first use.
    pub fn get_control(&mut self, name: &str, kind: ControlType) -> &mut ScopeControl {
        let key = (name.to_owned(), kind);
        let index = match self.control_lookup.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.controls.len();
                self.controls.push(ScopeControl {
                    name: name.to_owned(),
                    kind,
                    index,
                    direction: ControlDirection::None,
                });
                self.control_lookup.insert(key, index);
                index
            }
        };
        &mut self.controls[index]
    }

    pub fn controls(&self) -> &[ScopeControl] {
        &self.controls
    }

    pub fn into_controls(self) -> Vec<ScopeControl> {
        self.controls
    }
}
