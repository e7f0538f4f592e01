use crate::ast::{HoconObject, HoconRoot, HoconValue};
use indexmap::IndexMap;
use std::sync::Arc;

impl HoconObject {
    /// Merges `self` over `fallback` into a new object.
    ///
    /// Keys present on one side are carried over unchanged. Keys present on
    /// both sides merge recursively when both values are objects; otherwise
    /// the value from `self` wins. Neither input is modified, and untouched
    /// subtrees are shared with the inputs.
    ///
    /// Keys keep the order of `self`, followed by keys found only in
    /// `fallback` in their original order.
    pub fn merge_immutable(&self, fallback: &HoconObject) -> HoconObject {
        let mut items = IndexMap::with_capacity(self.len() + fallback.len());

        for (key, value) in self.iter() {
            let merged = match (value, fallback.get(key)) {
                (HoconValue::Object(over), Some(HoconValue::Object(under))) => {
                    if Arc::ptr_eq(over, under) {
                        value.clone()
                    } else {
                        HoconValue::Object(Arc::new(over.merge_immutable(under)))
                    }
                }
                _ => value.clone(),
            };
            items.insert(key.clone(), merged);
        }

        for (key, value) in fallback.iter() {
            if !items.contains_key(key) {
                items.insert(key.clone(), value.clone());
            }
        }

        HoconObject { items }
    }
}

impl HoconRoot {
    /// Merges `self` over `fallback`. The substitution sites of `self` come
    /// first, followed by those of `fallback`.
    pub fn merge_immutable(&self, fallback: &HoconRoot) -> HoconRoot {
        let object = self.object().merge_immutable(fallback.object());
        let substitutions = self
            .substitutions()
            .iter()
            .chain(fallback.substitutions())
            .cloned()
            .collect();
        log::debug!(
            "merged document roots ({} keys over {} keys)",
            self.object().len(),
            fallback.object().len()
        );
        HoconRoot::with_substitutions(object, substitutions)
    }
}
