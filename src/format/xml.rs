//! Minimal XML re-indenter for query text
//!
//! Only what FetchXML needs: elements, attributes, text, CDATA, comments,
//! declarations and doctypes. Anything unbalanced or unterminated is rejected.

const INDENT: &str = "  ";

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Start { name: &'a str, raw: &'a str },
    End { name: &'a str },
    Empty { raw: &'a str },
    Text(&'a str),
    CData(&'a str),
    Other(&'a str),
}

/// Re-indent `xml`; `None` when it is not well formed
pub fn pretty_print(xml: &str) -> Option<String> {
    let tokens = tokenize(xml)?;
    check_balanced(&tokens)?;

    let mut out = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Start { name, raw } => {
                // <a></a> and <a>text</a> stay on one line
                if let Some(Token::End { name: end }) = tokens.get(i + 1) {
                    if end == name {
                        push_line(&mut out, depth, &format!("{}</{}>", raw, end));
                        i += 2;
                        continue;
                    }
                }
                if let (Some(Token::Text(text) | Token::CData(text)), Some(Token::End { name: end })) =
                    (tokens.get(i + 1), tokens.get(i + 2))
                {
                    if end == name {
                        push_line(&mut out, depth, &format!("{}{}</{}>", raw, text, end));
                        i += 3;
                        continue;
                    }
                }
                push_line(&mut out, depth, raw);
                depth += 1;
            }
            Token::End { name } => {
                depth = depth.saturating_sub(1);
                push_line(&mut out, depth, &format!("</{}>", name));
            }
            Token::Empty { raw } | Token::Other(raw) => push_line(&mut out, depth, raw),
            Token::Text(text) | Token::CData(text) => push_line(&mut out, depth, text),
        }
        i += 1;
    }

    Some(out)
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(line);
}

fn tokenize(xml: &str) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = xml;

    while !rest.is_empty() {
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->")?;
            let len = 4 + end + 3;
            tokens.push(Token::Other(&rest[..len]));
            rest = &rest[len..];
        } else if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let end = body.find("]]>")?;
            let len = 9 + end + 3;
            tokens.push(Token::CData(&rest[..len]));
            rest = &rest[len..];
        } else if rest.starts_with("<!") {
            let len = declaration_len(rest)?;
            tokens.push(Token::Other(&rest[..len]));
            rest = &rest[len..];
        } else if rest.starts_with("<?") {
            let end = rest.find("?>")?;
            tokens.push(Token::Other(&rest[..end + 2]));
            rest = &rest[end + 2..];
        } else if rest.starts_with('<') {
            let len = tag_len(rest)?;
            let raw = &rest[..len];
            if let Some(inner) = raw.strip_prefix("</") {
                let name = inner.trim_end_matches('>').trim();
                if !is_name(name) {
                    return None;
                }
                tokens.push(Token::End { name });
            } else if raw.ends_with("/>") {
                tag_name(raw)?;
                tokens.push(Token::Empty { raw });
            } else {
                let name = tag_name(raw)?;
                tokens.push(Token::Start { name, raw });
            }
            rest = &rest[len..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = rest[..end].trim();
            if !text.is_empty() {
                tokens.push(Token::Text(text));
            }
            rest = &rest[end..];
        }
    }

    Some(tokens)
}

/// Length of the tag at the start of `s`, honouring quoted attribute values
fn tag_len(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in s.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '<') => return None,
            (None, '>') => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

/// Length of a `<!...>` declaration, skipping an internal `[...]` subset
fn declaration_len(s: &str) -> Option<usize> {
    let mut in_subset = false;
    for (idx, ch) in s.char_indices().skip(2) {
        match ch {
            '[' => in_subset = true,
            ']' => in_subset = false,
            '>' if !in_subset => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

fn tag_name(raw: &str) -> Option<&str> {
    let inner = raw.strip_prefix('<')?;
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(inner.len());
    let name = &inner[..end];
    is_name(name).then_some(name)
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn check_balanced(tokens: &[Token<'_>]) -> Option<()> {
    let mut stack = Vec::new();
    let mut roots = 0;
    for token in tokens {
        match token {
            Token::Start { name, .. } => {
                if stack.is_empty() {
                    roots += 1;
                }
                stack.push(*name);
            }
            Token::End { name } => {
                if stack.pop()? != *name {
                    return None;
                }
            }
            Token::Empty { .. } if stack.is_empty() => roots += 1,
            Token::Text(_) | Token::CData(_) if stack.is_empty() => return None,
            _ => {}
        }
    }
    (stack.is_empty() && roots == 1).then_some(())
}
