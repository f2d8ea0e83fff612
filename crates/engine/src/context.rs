//! State handed from one test step to the next
//!
//! Steps record what they discover under a name; later steps look it up.
//! A context belongs to one scenario and is passed to each step explicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{BomState, TargetSpecification};

/// Named results and fixture identities of one scenario run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestContext {
    boms: BTreeMap<String, BomState>,
    specifications: BTreeMap<String, TargetSpecification>,
    values: BTreeMap<String, String>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep an extracted BOM, replacing any earlier one of that name
    pub fn save_bom(&mut self, name: impl Into<String>, state: BomState) {
        self.boms.insert(name.into(), state);
    }

    pub fn bom(&self, name: &str) -> Option<&BomState> {
        self.boms.get(name)
    }

    pub fn save_specification(&mut self, name: impl Into<String>, spec: TargetSpecification) {
        self.specifications.insert(name.into(), spec);
    }

    pub fn specification(&self, name: &str) -> Option<&TargetSpecification> {
        self.specifications.get(name)
    }

    /// Record a discovered identity such as a product designation
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace `${key}` placeholders with recorded values
    ///
    /// Unknown keys are left as written.
    pub fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 3 + end]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, LineItem};

    #[test]
    fn test_saved_bom_is_returned() {
        let mut state = BomState::new();
        state.insert(LineItem::new("-", "Bolt", "pcs", 4.0, Category::StandardPart));

        let mut ctx = TestContext::new();
        ctx.save_bom("before", state.clone());

        assert_eq!(ctx.bom("before"), Some(&state));
        assert!(ctx.bom("after").is_none());
    }

    #[test]
    fn test_expand_placeholders() {
        let mut ctx = TestContext::new();
        ctx.set("product", "P-100");

        assert_eq!(ctx.expand("open ${product} now"), "open P-100 now");
        assert_eq!(ctx.expand("${missing}/${product}"), "${missing}/P-100");
        assert_eq!(ctx.expand("tail ${open"), "tail ${open");
        assert_eq!(ctx.expand("plain"), "plain");
    }
}
