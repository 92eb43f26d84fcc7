//! layered merging of usage trees
//!
//! Trees are built up by [fold]ing one source after another into an initially empty tree. Each
//! layer may add items and replaces the scalar values of the layers before it, but never removes
//! anything. Estimated data is applied last with [overlay_estimates] and beats every layer.
use crate::usage_tree::{UsageItem, UsageTree, UsageValue, UsageValueType};
use crate::value::{Value, ValueMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldOptions {
    /// Let the source decide the item's type
    ///
    /// Set for sources that know the real type (a resource's usage schema). Without it the
    /// destination keeps its type and incoming values are converted into it.
    pub override_value_type: bool,
}

impl FoldOptions {
    pub const fn override_value_type() -> Self {
        Self {
            override_value_type: true,
        }
    }
}

/// Fold everything `src` knows into `dest`
///
/// - items missing in `dest` are appended (in `src` order)
/// - the description is only taken when `dest` has none
/// - scalar defaults and values of `src` replace those of `dest`
/// - sub trees are folded recursively, an unset value is seeded from the default first
pub fn fold(dest: &mut UsageTree, src: &UsageTree, opts: FoldOptions) {
    for src_item in src {
        let dest_item = dest.get_or_insert(&src_item.key, src_item.value_type);

        if opts.override_value_type {
            dest_item.retype(src_item.value_type);
        } else if dest_item.value_type != src_item.value_type {
            tracing::debug!(
                key = %src_item.key,
                dest_type = %dest_item.value_type,
                src_type = %src_item.value_type,
                "type mismatch, keeping destination type"
            );
        }

        if dest_item.description.is_none() {
            dest_item.description.clone_from(&src_item.description);
        }

        fold_item(dest_item, src_item, opts);
    }
}

fn fold_item(dest: &mut UsageItem, src: &UsageItem, opts: FoldOptions) {
    let value_type = dest.value_type;

    if value_type == UsageValueType::SubTree {
        if let Some(src_default) = src.default_value.as_ref().and_then(UsageValue::as_sub_tree) {
            fold(sub_tree_slot(&mut dest.default_value, &dest.key), src_default, opts);
        }

        if let Some(src_value) = src.value.as_ref().and_then(UsageValue::as_sub_tree) {
            if dest.value.is_none() {
                dest.value.clone_from(&dest.default_value);
            }
            fold(sub_tree_slot(&mut dest.value, &dest.key), src_value, opts);
        }

        return;
    }

    if let Some(default_value) = &src.default_value {
        match coerce_logged(&dest.key, default_value, value_type) {
            Some(default_value) => dest.default_value = Some(default_value),
            None => {
                tracing::debug!(key=%dest.key, %value_type, "ignoring default of incompatible type")
            }
        }
    }

    if let Some(value) = &src.value {
        match coerce_logged(&dest.key, value, value_type) {
            Some(value) => dest.value = Some(value),
            None => {
                tracing::debug!(key=%dest.key, %value_type, "ignoring value of incompatible type")
            }
        }
    }
}

/// `value` converted into `value_type`, warning when the conversion loses the fraction
fn coerce_logged(key: &str, value: &UsageValue, value_type: UsageValueType) -> Option<UsageValue> {
    let coerced = value.clone().coerce(value_type)?;

    if let (UsageValue::Float64(from), UsageValue::Int64(to)) = (value, &coerced) {
        if *from != *to as f64 {
            tracing::warn!(
                %key,
                from = %value.value_type(),
                to = %value_type,
                value = %from,
                floored = %to,
                "value truncated to the declared type"
            );
        }
    }

    Some(coerced)
}

/// The sub tree held in `slot`, replacing anything that is not a sub tree
fn sub_tree_slot<'a>(slot: &'a mut Option<UsageValue>, key: &str) -> &'a mut UsageTree {
    if !matches!(slot, Some(UsageValue::SubTree(_))) {
        *slot = None;
    }

    match slot.get_or_insert_with(|| UsageValue::SubTree(UsageTree::new(key.to_string()))) {
        UsageValue::SubTree(tree) => tree,
        _ => unreachable!("slot holds a sub tree"),
    }
}

/// Apply estimated values on top of `tree`
///
/// Every item with a matching key in `estimated` takes the estimated value, decoded according
/// to the item's type. Keys the tree doesn't know are ignored. A sub tree is only touched when
/// the estimate mentions at least one of its keys.
pub fn overlay_estimates(tree: &mut UsageTree, estimated: &ValueMap) {
    for item in &mut tree.items {
        let Some(estimate) = estimated.get(&item.key) else {
            continue;
        };

        if item.value_type == UsageValueType::SubTree {
            overlay_sub_tree(item, estimate);
            continue;
        }

        match UsageValue::decode_as(&item.key, estimate, item.value_type) {
            Some(value) => {
                tracing::trace!(tree=%tree.name, key=%item.key, ?value, "estimated");
                item.value = Some(value);
            }
            None => tracing::debug!(
                tree = %tree.name,
                key = %item.key,
                value_type = %item.value_type,
                ?estimate,
                "estimate does not fit item type"
            ),
        }
    }
}

fn overlay_sub_tree(item: &mut UsageItem, estimate: &Value) {
    let Some(estimated) = estimate.as_object() else {
        tracing::debug!(key=%item.key, ?estimate, "estimate for sub tree is not a map");
        return;
    };

    if item.value.is_none() {
        let mut seeded = UsageTree::new(item.key.clone());
        if let Some(default) = item.default_value.as_ref().and_then(UsageValue::as_sub_tree) {
            for default_item in default {
                if estimated.contains_key(&default_item.key) {
                    seeded.push(default_item.clone());
                }
            }
        }

        if seeded.is_empty() {
            return;
        }

        item.value = Some(UsageValue::SubTree(seeded));
    }

    if let Some(value) = item.value.as_mut().and_then(UsageValue::as_sub_tree_mut) {
        overlay_estimates(value, estimated);
    }
}
