//! Anchor and alias resolution.
//!
//! Anchors (`&label value`) register structural values; aliases (`*label`)
//! substitute a deep copy of the referent. Labels are unique across the
//! whole document (F202). Aliases resolve in source order against anchors
//! of the same facet only: a forward reference, a cycle, a cross-facet
//! reference or an unknown label are all F201, each with its own message.

use std::collections::HashMap;

use crate::ast::{Block, Facet, Value};
use crate::error::{Code, Diagnostic, Pos};

/// Resolve every anchor and alias; returns facets whose bodies contain
/// neither `Value::Anchor` nor `Value::Alias`.
pub fn resolve_facets(facets: Vec<Facet>) -> Result<Vec<Facet>, Diagnostic> {
    // Uniqueness pass: one namespace for the whole document.
    let mut owner: HashMap<String, usize> = HashMap::new();
    for (idx, facet) in facets.iter().enumerate() {
        if let Some(label) = &facet.anchor {
            register(&mut owner, label, idx, facet.pos)?;
        }
        collect_block(&facet.body, idx, &mut owner)?;
    }

    facets
        .into_iter()
        .enumerate()
        .map(|(idx, mut facet)| {
            let mut scope = FacetScope {
                facet_idx: idx,
                facet_label: facet.anchor.clone(),
                owner: &owner,
                defined: HashMap::new(),
                resolving: Vec::new(),
            };
            let body = std::mem::replace(&mut facet.body, Block::Empty);
            facet.body = scope.resolve_block(body)?;
            Ok(facet)
        })
        .collect()
}

fn register(
    owner: &mut HashMap<String, usize>,
    label: &str,
    idx: usize,
    pos: Pos,
) -> Result<(), Diagnostic> {
    if owner.insert(label.to_string(), idx).is_some() {
        return Err(Diagnostic::new(
            Code::F202,
            format!("anchor redefinition: '{}'", label),
            pos,
        ));
    }
    Ok(())
}

fn collect_block(
    block: &Block,
    idx: usize,
    owner: &mut HashMap<String, usize>,
) -> Result<(), Diagnostic> {
    match block {
        Block::Empty => Ok(()),
        Block::Map(kvs) => {
            for kv in kvs {
                collect_value(&kv.value, idx, owner, kv.pos)?;
            }
            Ok(())
        }
        Block::List(items) => {
            for item in items {
                collect_value(&item.value, idx, owner, item.pos)?;
            }
            Ok(())
        }
    }
}

fn collect_value(
    v: &Value,
    idx: usize,
    owner: &mut HashMap<String, usize>,
    pos: Pos,
) -> Result<(), Diagnostic> {
    match v {
        Value::Anchor { label, value } => {
            register(owner, label, idx, pos)?;
            collect_value(value, idx, owner, pos)
        }
        Value::InlineMap(map) => {
            for v in map.values() {
                collect_value(v, idx, owner, pos)?;
            }
            Ok(())
        }
        Value::InlineList(items) => {
            for v in items {
                collect_value(v, idx, owner, pos)?;
            }
            Ok(())
        }
        Value::Map(kvs) => {
            for kv in kvs {
                collect_value(&kv.value, idx, owner, kv.pos)?;
            }
            Ok(())
        }
        Value::List(items) => {
            for item in items {
                collect_value(&item.value, idx, owner, item.pos)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

struct FacetScope<'a> {
    facet_idx: usize,
    facet_label: Option<String>,
    owner: &'a HashMap<String, usize>,
    /// Anchors resolved so far, in source order.
    defined: HashMap<String, Value>,
    /// Labels whose inner value is currently being resolved (cycle marks).
    resolving: Vec<String>,
}

impl FacetScope<'_> {
    fn resolve_block(&mut self, block: Block) -> Result<Block, Diagnostic> {
        match block {
            Block::Empty => Ok(Block::Empty),
            Block::Map(kvs) => {
                let kvs = kvs
                    .into_iter()
                    .map(|mut kv| {
                        let value = std::mem::replace(&mut kv.value, Value::Null);
                        kv.value = self.resolve_value(value, kv.pos)?;
                        Ok(kv)
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(Block::Map(kvs))
            }
            Block::List(items) => {
                let items = items
                    .into_iter()
                    .map(|mut item| {
                        let value = std::mem::replace(&mut item.value, Value::Null);
                        item.value = self.resolve_value(value, item.pos)?;
                        Ok(item)
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(Block::List(items))
            }
        }
    }

    fn resolve_value(&mut self, v: Value, pos: Pos) -> Result<Value, Diagnostic> {
        match v {
            Value::Anchor { label, value } => {
                self.resolving.push(label.clone());
                let inner = self.resolve_value(*value, pos)?;
                self.resolving.pop();
                self.defined.insert(label, inner.clone());
                Ok(inner)
            }
            Value::Alias(label) => {
                if self.resolving.contains(&label) {
                    return Err(Diagnostic::new(
                        Code::F201,
                        format!("anchor cycle detected at '{}'", label),
                        pos,
                    ));
                }
                if let Some(value) = self.defined.get(&label) {
                    return Ok(value.clone());
                }
                if self.facet_label.as_deref() == Some(label.as_str()) {
                    return Err(Diagnostic::new(
                        Code::F201,
                        format!("anchor cycle detected at '{}'", label),
                        pos,
                    ));
                }
                match self.owner.get(&label) {
                    Some(&idx) if idx == self.facet_idx => Err(Diagnostic::new(
                        Code::F201,
                        format!("alias '*{}' must follow its anchor definition", label),
                        pos,
                    )),
                    Some(_) => Err(Diagnostic::new(
                        Code::F201,
                        format!("anchor '{}' is not visible across facets", label),
                        pos,
                    )),
                    None => Err(Diagnostic::new(
                        Code::F201,
                        format!("undefined anchor alias: '{}'", label),
                        pos,
                    )),
                }
            }
            Value::InlineMap(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.resolve_value(v, pos)?);
                }
                Ok(Value::InlineMap(out))
            }
            Value::InlineList(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_value(item, pos)?);
                }
                Ok(Value::InlineList(out))
            }
            Value::Map(kvs) => {
                let kvs = kvs
                    .into_iter()
                    .map(|mut kv| {
                        let value = std::mem::replace(&mut kv.value, Value::Null);
                        kv.value = self.resolve_value(value, kv.pos)?;
                        Ok(kv)
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(Value::Map(kvs))
            }
            Value::List(items) => {
                let items = items
                    .into_iter()
                    .map(|mut item| {
                        let value = std::mem::replace(&mut item.value, Value::Null);
                        item.value = self.resolve_value(value, item.pos)?;
                        Ok(item)
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(Value::List(items))
            }
            other => Ok(other),
        }
    }
}
