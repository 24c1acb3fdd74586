use crate::declaration::Declaration;
use crate::error::{AspectError, Result};
use crate::value::{CallArgs, Value};
use std::collections::BTreeMap;

/// Assemble the predicate call for a declaration.
///
/// Positionals are the first `positional_arg_count` caller positionals, then the
/// literals, then the return value when the declaration asks for it and one is
/// supplied. Keywords are the caller keywords restricted to `keyword_keys`.
pub fn route(
    declaration: &Declaration,
    call: &CallArgs,
    return_value: Option<&Value>,
) -> Result<CallArgs> {
    let count = declaration.positional_arg_count;
    if call.positional.len() < count {
        return Err(AspectError::missing_argument(
            &declaration.predicate_name,
            format!("positional[{}]", call.positional.len()),
        ));
    }

    let mut positional =
        Vec::with_capacity(count + declaration.literal_args.len() + usize::from(return_value.is_some()));
    positional.extend_from_slice(&call.positional[..count]);
    positional.extend(declaration.literal_args.iter().cloned());
    if declaration.include_return_value {
        if let Some(value) = return_value {
            positional.push(value.clone());
        }
    }

    let mut keywords = BTreeMap::new();
    for key in &declaration.keyword_keys {
        let value = call
            .keywords
            .get(key)
            .ok_or_else(|| AspectError::missing_argument(&declaration.predicate_name, key))?;
        keywords.insert(key.clone(), value.clone());
    }

    Ok(CallArgs {
        positional,
        keywords,
    })
}
