//! `%%` header comments: title, creator, creation date and the WIZVAR
//! record-field declarations.

use crate::ast::Metadata;
use crate::lexer::{Spanned, Token};

pub(super) fn read_metadata(tokens: &[Spanned]) -> Metadata {
    let mut meta = Metadata::default();
    let mut in_wizvar = false;
    for spanned in tokens {
        let Token::Comment(text) = &spanned.token else {
            continue;
        };
        // `%%Title:` arrives as `%Title:`
        let Some(body) = text.strip_prefix('%') else {
            continue;
        };
        let body = body.trim();
        if let Some(v) = body.strip_prefix("Title:") {
            meta.title.get_or_insert_with(|| v.trim().to_owned());
        } else if let Some(v) = body.strip_prefix("Creator:") {
            meta.creator.get_or_insert_with(|| v.trim().to_owned());
        } else if let Some(v) = body.strip_prefix("CreationDate:") {
            meta.creation_date.get_or_insert_with(|| v.trim().to_owned());
        } else if body.starts_with("WIZVAR:BEGIN") {
            in_wizvar = true;
        } else if body.starts_with("WIZVAR:END") {
            in_wizvar = false;
        } else if in_wizvar {
            if let Some(rest) = body.strip_prefix("WIZVAR") {
                let rest = rest.trim_start_matches(':');
                for field in rest.split(',').map(str::trim) {
                    if !field.is_empty() && !field.starts_with("PREFIX") {
                        meta.fields.push(field.to_owned());
                    }
                }
            }
        }
    }
    meta
}
