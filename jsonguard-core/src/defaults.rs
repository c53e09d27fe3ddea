//! Default injection: walk a schema alongside an instance and fill in every
//! declared `default` the instance lacks, before the instance is validated.
//!
//! Covered keywords: `properties`, `patternProperties`, `additionalProperties`
//! (schema form), `items` (schema and tuple form), `allOf`, `dependencies`
//! (schema form), `if`/`then`/`else` and local `$ref`. `anyOf` and `oneOf` are
//! not followed since no branch is known to apply before validation.

use jsonschema::Draft;
use regex::Regex;
use serde_json::{Map, Value};

/// Inject the defaults declared by `schema` into `instance`.
///
/// Values that cannot hold a default at the walked position (a string where the
/// schema expects an object, say) are left untouched; validation reports them.
pub fn inject_defaults(schema: &Value, instance: &mut Value) {
    let walker = DefaultsWalker { root: schema };
    walker.visit(schema, instance, &mut Vec::new(), &mut Vec::new());
}

struct DefaultsWalker<'s> {
    root: &'s Value,
}

impl<'s> DefaultsWalker<'s> {
    /// `active_refs` holds the references followed at the current instance
    /// position; a reference already in it is a cycle.
    ///
    /// `injected` holds the subschemas whose default was inserted on the way
    /// down. A default is never inserted again below its own insertion, so a
    /// recursive schema with a defaulted child stops after one level.
    fn visit(
        &self,
        node: &'s Value,
        instance: &mut Value,
        active_refs: &mut Vec<&'s str>,
        injected: &mut Vec<&'s Value>,
    ) {
        let Some(keywords) = node.as_object() else {
            return;
        };

        if let Some(reference) = keywords.get("$ref").and_then(Value::as_str) {
            // Draft 7: siblings of `$ref` are ignored.
            if active_refs.contains(&reference) {
                return;
            }
            if let Some(target) = self.resolve(reference) {
                active_refs.push(reference);
                self.visit(target, instance, active_refs, injected);
                active_refs.pop();
            }
            return;
        }

        if let Some(branches) = keywords.get("allOf").and_then(Value::as_array) {
            for branch in branches {
                self.visit(branch, instance, active_refs, injected);
            }
        }

        match instance {
            Value::Object(object) => self.visit_object(keywords, object, injected),
            Value::Array(items) => self.visit_array(keywords, items, injected),
            _ => {}
        }

        if let Some(dependencies) = keywords.get("dependencies").and_then(Value::as_object) {
            for (name, dependency) in dependencies {
                if dependency.is_object() && instance.get(name).is_some() {
                    self.visit(dependency, instance, active_refs, injected);
                }
            }
        }

        if let Some(condition) = keywords.get("if") {
            let branch = if self.holds(condition, instance) {
                keywords.get("then")
            } else {
                keywords.get("else")
            };
            if let Some(branch) = branch {
                self.visit(branch, instance, active_refs, injected);
            }
        }
    }

    fn visit_object(
        &self,
        keywords: &'s Map<String, Value>,
        object: &mut Map<String, Value>,
        injected: &mut Vec<&'s Value>,
    ) {
        let properties = keywords.get("properties").and_then(Value::as_object);

        if let Some(properties) = properties {
            for (name, subschema) in properties {
                let mut fresh = false;
                if !object.contains_key(name) && !Self::injected_below(injected, subschema) {
                    if let Some(default) = subschema.get("default") {
                        object.insert(name.clone(), default.clone());
                        fresh = true;
                    }
                }
                if let Some(child) = object.get_mut(name) {
                    self.visit_child(subschema, child, injected, fresh);
                }
            }
        }

        let patterns: Vec<(Regex, &'s Value)> = keywords
            .get("patternProperties")
            .and_then(Value::as_object)
            .map(|patterns| {
                patterns
                    .iter()
                    .filter_map(|(pattern, subschema)| Some((Regex::new(pattern).ok()?, subschema)))
                    .collect()
            })
            .unwrap_or_default();
        let additional = keywords
            .get("additionalProperties")
            .filter(|schema| schema.is_object());

        if patterns.is_empty() && additional.is_none() {
            return;
        }
        for (name, child) in object.iter_mut() {
            let mut matched = false;
            for (pattern, subschema) in &patterns {
                if pattern.is_match(name) {
                    matched = true;
                    self.visit_child(*subschema, child, injected, false);
                }
            }
            let declared = properties.map_or(false, |p| p.contains_key(name));
            if let Some(additional) = additional {
                if !declared && !matched {
                    self.visit_child(additional, child, injected, false);
                }
            }
        }
    }

    fn visit_array(
        &self,
        keywords: &'s Map<String, Value>,
        items: &mut Vec<Value>,
        injected: &mut Vec<&'s Value>,
    ) {
        match keywords.get("items") {
            Some(Value::Array(positions)) => {
                let supplied = items.len();
                for subschema in positions.iter().skip(supplied) {
                    if Self::injected_below(injected, subschema) {
                        break;
                    }
                    match subschema.get("default") {
                        Some(default) => items.push(default.clone()),
                        None => break,
                    }
                }
                let walked = positions.iter().zip(items.iter_mut()).enumerate();
                for (index, (subschema, item)) in walked {
                    self.visit_child(subschema, item, injected, index >= supplied);
                }
            }
            Some(subschema @ Value::Object(_)) => {
                for item in items.iter_mut() {
                    self.visit_child(subschema, item, injected, false);
                }
            }
            _ => {}
        }
    }

    /// Descend one instance level. References restart at every position.
    fn visit_child(
        &self,
        subschema: &'s Value,
        child: &mut Value,
        injected: &mut Vec<&'s Value>,
        fresh: bool,
    ) {
        if fresh {
            injected.push(subschema);
        }
        self.visit(subschema, child, &mut Vec::new(), injected);
        if fresh {
            injected.pop();
        }
    }

    fn injected_below(injected: &[&'s Value], subschema: &'s Value) -> bool {
        injected.iter().any(|seen| std::ptr::eq(*seen, subschema))
    }

    /// Whether `instance` satisfies an `if` subschema. Root definitions are
    /// carried over so local references in the condition still resolve.
    fn holds(&self, condition: &Value, instance: &Value) -> bool {
        let mut condition = condition.clone();
        if let (Some(keywords), Some(definitions)) =
            (condition.as_object_mut(), self.root.get("definitions"))
        {
            keywords
                .entry("definitions")
                .or_insert_with(|| definitions.clone());
        }
        match jsonschema::options().with_draft(Draft::Draft7).build(&condition) {
            Ok(validator) => validator.is_valid(instance),
            Err(error) => {
                tracing::debug!(%error, "`if` subschema does not compile; taking `else`");
                false
            }
        }
    }

    /// Resolve a document-local reference (`#`, `#/definitions/x`). Remote references are skipped.
    fn resolve(&self, reference: &str) -> Option<&'s Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(self.root);
        }
        self.root.pointer(pointer)
    }
}
