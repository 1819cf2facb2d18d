use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::xml::Document;

use super::MergeError;

/// `<link>` elements without attributes, content captured lazily.
static LINK_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link>(.*?)</link>").unwrap());

/// A predefined entity or character reference at the start of the haystack.
///
/// Other named references (`&b;`) are undefined without a DTD and fail to
/// parse, so they count as bare ampersands.
static ENTITY_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#x[0-9A-Fa-f]+|amp|lt|gt|quot|apos);").unwrap()
});

const CDATA_OPEN: &str = "<![CDATA[";

/// Parses an episode document.
///
/// Generators sometimes emit raw query strings in `<link>` text
/// (`https://example.com/?a=1&b=2`). When the first parse fails, that single
/// pattern is repaired by wrapping the link text in CDATA and the document is
/// parsed again. Any other malformation is returned as-is, with the error
/// from the original text.
pub fn load_episode(content: &str) -> Result<Document, MergeError> {
    let original_err = match Document::parse(content) {
        Ok(doc) => return Ok(doc),
        Err(e) => e,
    };

    let Some(repaired) = repair_link_ampersands(content) else {
        return Err(MergeError::MalformedEpisode(original_err));
    };

    match Document::parse(&repaired) {
        Ok(doc) => {
            tracing::warn!(
                error = %original_err,
                "Episode had unescaped '&' in <link>, wrapped link text in CDATA"
            );
            Ok(doc)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Episode still malformed after link repair");
            Err(MergeError::MalformedEpisode(original_err))
        }
    }
}

/// Wraps `<link>` text containing a bare `&` in a CDATA section.
///
/// Text that already contains a CDATA marker is left alone, as is every
/// character outside `<link>...</link>`. Returns `None` when nothing needed
/// wrapping.
pub fn repair_link_ampersands(content: &str) -> Option<String> {
    let mut changed = false;
    let repaired = LINK_ELEMENT.replace_all(content, |caps: &Captures<'_>| {
        let inner = &caps[1];
        if inner.contains(CDATA_OPEN) || !has_bare_ampersand(inner) {
            return caps[0].to_string();
        }
        changed = true;
        format!("<link>{CDATA_OPEN}{inner}]]></link>")
    });

    match repaired {
        Cow::Owned(text) if changed => Some(text),
        _ => None,
    }
}

/// True if some `&` in `text` does not start an entity or character reference.
fn has_bare_ampersand(text: &str) -> bool {
    text.match_indices('&')
        .any(|(idx, _)| !ENTITY_REF.is_match(&text[idx..]))
}
