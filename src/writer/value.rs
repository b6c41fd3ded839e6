//! Configuration entries

use crate::types::{Param, ParamSpec, ParamType, Scalar};

/// Text of one configuration entry, or `None` when nothing is written
pub fn entry(spec: &ParamSpec, param: &Param) -> Option<String> {
    let name = spec.name.to_ascii_uppercase();
    let tokens = match (&spec.ty, param) {
        (_, Param::Scalar(Scalar::Keyword(true))) => return Some(name),
        (_, Param::Scalar(Scalar::Keyword(false))) => return None,
        (_, Param::Scalar(scalar)) => vec![name, scalar.to_token()],
        (ParamType::Record { fields }, Param::Record(record)) => {
            let tokens = record.to_tokens(fields);
            if spec.leading_keyword().is_some() {
                tokens
            } else {
                std::iter::once(name).chain(tokens).collect()
            }
        }
        (ParamType::Keystring { variants }, Param::Keystring(keystring)) => {
            let tokens = keystring.to_tokens(variants);
            if spec.tagged {
                std::iter::once(name).chain(tokens).collect()
            } else {
                tokens
            }
        }
        _ => return None,
    };
    Some(tokens.join(" "))
}
