//! Line extraction from loosely structured poem markup.
//!
//! Paragraph containers (`<p>`) map one-to-one onto lines; an empty container
//! is a stanza break and survives as an empty line. A `<br>` inside a
//! container is a soft break and stays embedded as `\n` in that line's text.
//! Without any container the whole body is split on `<br>` and newlines.
//!
//! Scanning is forgiving by construction: there is no error path. Anything
//! that does not look like a tag is text, unterminated tags swallow the rest
//! of the input, and unknown character references are kept verbatim.

use std::borrow::Cow;

/// Elements whose content is never line text. The scanner skips straight to
/// their closing tag.
const RAW_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "title"];

/// Start tags that implicitly close an open paragraph.
const PARAGRAPH_CLOSERS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "div",
    "dl",
    "fieldset",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "pre",
    "section",
    "table",
    "ul",
];

#[derive(Clone, Debug, Eq, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Open(String),
    Close(String),
}

#[derive(Clone, Debug)]
struct Item<'a> {
    piece: Piece<'a>,
    start: usize,
    end: usize,
}

enum Markup<'a> {
    Tag(Item<'a>),
    Skipped,
    NotMarkup,
}

/// Tag-level scanner over a markup fragment. Tag names are lowercased.
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    raw_text: Option<&'static str>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_text: None,
        }
    }

    fn markup_at(&mut self, start: usize) -> Markup<'a> {
        let rest = &self.src[start..];
        if let Some(body) = rest.strip_prefix("<!--") {
            self.pos = body
                .find("-->")
                .map_or(self.src.len(), |i| start + 4 + i + 3);
            return Markup::Skipped;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos = rest.find('>').map_or(self.src.len(), |i| start + i + 1);
            return Markup::Skipped;
        }

        let (closing, name_start) = if rest.starts_with("</") {
            (true, 2)
        } else {
            (false, 1)
        };
        let tail = &rest[name_start..];
        if !tail.as_bytes().first().is_some_and(u8::is_ascii_alphabetic) {
            return Markup::NotMarkup;
        }
        let name_len = tail
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b':')
            .count();
        let after_name = name_start + name_len;
        let Some(close) = tag_end(&rest[after_name..]) else {
            self.pos = self.src.len();
            return Markup::Skipped;
        };

        let end = start + after_name + close + 1;
        let name = rest[name_start..after_name].to_ascii_lowercase();
        self.pos = end;
        let piece = if closing {
            Piece::Close(name)
        } else {
            self.raw_text = RAW_TEXT_ELEMENTS.iter().copied().find(|raw| *raw == name);
            Piece::Open(name)
        };
        Markup::Tag(Item { piece, start, end })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.raw_text.take() {
            let needle = format!("</{name}");
            match self.src[self.pos..].to_ascii_lowercase().find(&needle) {
                Some(offset) => self.pos += offset,
                None => {
                    self.pos = self.src.len();
                    return None;
                }
            }
        }

        loop {
            let start = self.pos;
            if start >= self.src.len() {
                return None;
            }
            let lead_lt = self.src.as_bytes()[start] == b'<';
            if lead_lt {
                match self.markup_at(start) {
                    Markup::Tag(item) => return Some(item),
                    Markup::Skipped => continue,
                    Markup::NotMarkup => {}
                }
            }
            let search_from = if lead_lt { start + 1 } else { start };
            let end = self.src[search_from..]
                .find('<')
                .map_or(self.src.len(), |i| search_from + i);
            self.pos = end;
            return Some(Item {
                piece: Piece::Text(&self.src[start..end]),
                start,
                end,
            });
        }
    }
}

/// Offset of the `>` closing a tag, skipping quoted attribute values.
fn tag_end(attrs: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut last_significant = 0u8;
    for (i, b) in attrs.bytes().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' if last_significant == b'=' => quote = Some(b),
            b'>' => return Some(i),
            _ => {}
        }
        if !b.is_ascii_whitespace() {
            last_significant = b;
        }
    }
    None
}

/// Split poem markup into display lines.
///
/// Each `<p>` container yields exactly one line (empty containers included);
/// without containers the flattened body is split on line breaks. Trailing
/// spaces and tabs are trimmed; every other character of spacing is kept.
pub fn extract_lines(markup: &str) -> Vec<String> {
    let paragraphs = paragraph_bodies(markup);
    if paragraphs.is_empty() {
        return flatten(markup).split('\n').map(clean_line).collect();
    }
    paragraphs
        .into_iter()
        .map(|inner| clean_line(&flatten(inner)))
        .collect()
}

/// Inner markup of every paragraph container, in document order.
pub(crate) fn paragraph_bodies(markup: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let mut open: Option<usize> = None;
    for item in Scanner::new(markup) {
        match &item.piece {
            Piece::Open(name) if name == "p" => {
                if let Some(inner_start) = open.take() {
                    bodies.push(&markup[inner_start..item.start]);
                }
                open = Some(item.end);
            }
            Piece::Open(name) if PARAGRAPH_CLOSERS.contains(&name.as_str()) => {
                if let Some(inner_start) = open.take() {
                    bodies.push(&markup[inner_start..item.start]);
                }
            }
            // A stray `</p>` stands for an empty paragraph.
            Piece::Close(name) if name == "p" => match open.take() {
                Some(inner_start) => bodies.push(&markup[inner_start..item.start]),
                None => bodies.push(""),
            },
            Piece::Close(name) if name == "body" || name == "html" => {
                if let Some(inner_start) = open.take() {
                    bodies.push(&markup[inner_start..item.start]);
                }
            }
            _ => {}
        }
    }
    if let Some(inner_start) = open {
        bodies.push(&markup[inner_start..]);
    }
    bodies
}

/// Inner markup of the first `name` element. An element left open runs to the
/// end of the input.
pub(crate) fn first_element_body<'a>(markup: &'a str, name: &str) -> Option<&'a str> {
    let mut open: Option<usize> = None;
    for item in Scanner::new(markup) {
        match &item.piece {
            Piece::Open(tag) if open.is_none() && tag == name => open = Some(item.end),
            Piece::Close(tag) if tag == name => {
                if let Some(inner_start) = open {
                    return Some(&markup[inner_start..item.start]);
                }
            }
            _ => {}
        }
    }
    open.map(|inner_start| &markup[inner_start..])
}

/// Text content of a fragment, scanned on its own so no open element from
/// elsewhere in the document applies. Breaks become `\n`.
pub(crate) fn flatten(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_head = false;
    for item in Scanner::new(fragment) {
        match item.piece {
            Piece::Text(text) if !in_head => out.push_str(&decode_entities(text)),
            Piece::Open(name) | Piece::Close(name) if name == "br" => out.push('\n'),
            Piece::Open(name) if name == "head" => in_head = true,
            Piece::Close(name) if name == "head" => in_head = false,
            Piece::Open(name) if name == "body" => in_head = false,
            _ => {}
        }
    }
    out
}

fn clean_line(line: &str) -> String {
    line.replace('\r', "")
        .replace('\u{a0}', " ")
        .trim_end_matches([' ', '\t'])
        .to_string()
}

/// Decode character references. Unknown or malformed references are left
/// untouched.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match parse_reference(tail) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Longest named reference in the HTML5 table, `&CounterClockwiseContourIntegral;`.
const MAX_REFERENCE_LEN: usize = 33;

fn parse_reference(tail: &str) -> Option<(Cow<'_, str>, usize)> {
    let semi = tail.find(';')?;
    if semi > MAX_REFERENCE_LEN {
        return None;
    }
    let body = &tail[1..semi];
    let decoded = match body.strip_prefix('#') {
        Some(num) => {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            let ch = char::from_u32(code).filter(|c| *c != '\0')?;
            Cow::Owned(ch.to_string())
        }
        None => named_reference(&tail[..=semi])?,
    };
    Some((decoded, semi + 1))
}

/// Decode one `&name;` reference against the full HTML5 table. `&nbsp;`
/// matches in any case.
fn named_reference(reference: &str) -> Option<Cow<'_, str>> {
    let name = &reference[1..reference.len() - 1];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    if name.eq_ignore_ascii_case("nbsp") {
        return Some(Cow::Borrowed("\u{a0}"));
    }
    match html_escape::decode_html_entities(reference) {
        Cow::Owned(decoded) if decoded != reference => Some(Cow::Owned(decoded)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_paragraph() {
        let lines = extract_lines(
            "<p>She sang in the rain.</p><p>The clouds were gentle, the night was kind.</p>",
        );
        assert_eq!(
            lines,
            vec![
                "She sang in the rain.",
                "The clouds were gentle, the night was kind."
            ]
        );
    }

    #[test]
    fn empty_paragraphs_are_stanza_breaks() {
        let lines = extract_lines("<p>un</p><p></p><p>deux</p><p>   </p><p>trois</p>");
        assert_eq!(lines, vec!["un", "", "deux", "", "trois"]);
    }

    #[test]
    fn breaks_inside_paragraph_stay_embedded() {
        let lines = extract_lines("<p>un<br>deux<BR/>trois</p><p>quatre</p>");
        assert_eq!(lines, vec!["un\ndeux\ntrois", "quatre"]);
    }

    #[test]
    fn inline_tags_do_not_leak_between_lines() {
        let lines = extract_lines(r#"<p><em class="x">a</p><p>b</em></p><p><span title="x>y">mot</span></p>"#);
        assert_eq!(lines, vec!["a", "b", "mot"]);
    }

    #[test]
    fn falls_back_to_breaks_without_paragraphs() {
        let lines = extract_lines("un<br>deux<br><br>trois\nquatre");
        assert_eq!(lines, vec!["un", "deux", "", "trois", "quatre"]);
    }

    #[test]
    fn keeps_internal_spacing_and_trims_trailing() {
        let lines = extract_lines("<p>  deux  espaces\t \r</p><p>a&nbsp;&nbsp;b\u{a0}</p>");
        assert_eq!(lines, vec!["  deux  espaces", "a  b"]);
    }

    #[test]
    fn decodes_character_references() {
        let lines = extract_lines("<p>l&rsquo;eau &amp; l&#233;t&#xE9; &foo; &amp</p>");
        assert_eq!(lines, vec!["l’eau & lété &foo; &amp"]);
    }

    #[test]
    fn decodes_every_html5_named_reference() {
        let lines = extract_lines(
            "<p>&Icirc;le &oacute; &Agrave; &copy; caf&eacute; &Ucirc;&NBSP;x&Nbsp;y</p>",
        );
        assert_eq!(lines, vec!["Île ó À © café Û x y"]);
        let words: Vec<&str> = crate::tokenize_line(&lines[0])
            .map(|span| span.surface)
            .collect();
        assert_eq!(words, vec!["Île", "ó", "À", "café", "Û", "x", "y"]);
    }

    #[test]
    fn longest_named_reference_fits() {
        assert_eq!(decode_entities("&CounterClockwiseContourIntegral;"), "\u{2233}");
        assert_eq!(decode_entities("&unknownname; &a-b;"), "&unknownname; &a-b;");
    }

    #[test]
    fn first_element_body_finds_raw_text_and_nested_markup() {
        let doc = "<html><head><TITLE>Nuit &amp; jour</TITLE></head>\
                   <body><h1 class=\"t\"><em>La</em> Nuit</h1><h1>Autre</h1><b>gras";
        assert_eq!(first_element_body(doc, "title"), Some("Nuit &amp; jour"));
        assert_eq!(first_element_body(doc, "h1"), Some("<em>La</em> Nuit"));
        assert_eq!(first_element_body(doc, "b"), Some("gras"));
        assert_eq!(first_element_body(doc, "h2"), None);
    }

    #[test]
    fn malformed_markup_degrades_to_text() {
        assert_eq!(extract_lines("<p>a < b</p><p>c"), vec!["a < b", "c"]);
        assert_eq!(extract_lines("<p>x<span"), vec!["x"]);
        assert_eq!(extract_lines("<p>a</p></p>"), vec!["a", ""]);
    }

    #[test]
    fn block_elements_close_paragraphs() {
        assert_eq!(extract_lines("<p>a<div>b</div><p>c"), vec!["a", "c"]);
    }

    #[test]
    fn skips_head_comments_and_scripts() {
        let doc = "<html><head><title>T</title><style>p{}</style></head>\
                   <body>ligne<script>var a = '<p>';</script></body></html>";
        assert_eq!(extract_lines(doc), vec!["ligne"]);
        assert_eq!(extract_lines("<p>a<!-- <p>x</p> -->b</p>"), vec!["ab"]);
    }

    #[test]
    fn raw_newlines_inside_paragraph_are_kept() {
        assert_eq!(extract_lines("<p>a\r\nb</p>"), vec!["a\nb"]);
    }

    #[test]
    fn multibyte_text_scans_cleanly() {
        assert_eq!(
            extract_lines("<p>été à l’ombre</p><p>œuvre</p>"),
            vec!["été à l’ombre", "œuvre"]
        );
    }
}
