//! Fenced code block extraction from model responses

/// Body of the first ```` ```{lang} ```` block for any of `languages`.
///
/// The opening fence must be followed by a newline and the closing fence
/// must start its own line; an unterminated block (still streaming) yields
/// `None`. When
/// several languages match, the earliest block in the text wins.
pub fn extract_fenced_block<'a>(text: &'a str, languages: &[&str]) -> Option<&'a str> {
    languages
        .iter()
        .filter_map(|lang| {
            let opener = format!("```{}\n", lang);
            let start = text.find(&opener)? + opener.len();
            let body = &text[start..];
            let end = body.find("\n```")?;
            Some((start, &body[..end]))
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, body)| body)
}
