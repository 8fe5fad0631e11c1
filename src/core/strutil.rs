use crate::core::error::DbError;

/// 按分隔符切分字符串。
/// ignore_quotes为true时，位于成对的双引号或单引号内部的字符不参与切分；
/// 反斜杠每出现一次就翻转一次转义标志。只有同种引号才能闭合已打开的引号。
/// 返回值至少包含一个元素；末尾的分隔符会产生一个空字符串。
pub fn split(s: &str, delim: char, ignore_quotes: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;
    let mut quote_char = '\0';
    for c in s.chars() {
        if ignore_quotes {
            if c == '\\' {
                escaped = !escaped;
            } else {
                if (c == '"' || c == '\'') && !escaped {
                    if c == quote_char || quote_char == '\0' {
                        quoted = !quoted;
                        quote_char = if quoted { c } else { '\0' };
                    }
                }
                escaped = false;
            }
        }
        // 分隔符本身是引号时，未转义的引号仍然切分（配额校验依赖这一点）
        if c == delim && (!quoted || (!escaped && (c == '\'' || c == '"'))) {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// 提取带引号字符串的内部内容。
/// 仅当s以同一种引号开头和结尾、且内部不存在未转义的同种引号时才剥掉引号，
/// 否则原样返回。
pub fn extract_quoted(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return s;
    }
    let quote = bytes[0];
    if (quote != b'"' && quote != b'\'') || bytes[bytes.len() - 1] != quote {
        return s;
    }
    let mut escaped = false;
    for &b in &bytes[1..bytes.len() - 1] {
        if b == b'\\' {
            escaped = !escaped;
        } else {
            if b == quote && !escaped {
                return s;
            }
            escaped = false;
        }
    }
    &s[1..s.len() - 1]
}

/// 把转义序列替换为其字面字符。只支持 \'、\" 和 \\。
pub fn unescape(s: &str) -> Result<String, DbError> {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for c in s.chars() {
        if c == '\\' && !escaped {
            escaped = true;
        } else {
            if escaped {
                match c {
                    '\'' | '"' | '\\' => out.push(c),
                    other => return Err(DbError::BadEscape(other)),
                }
            } else {
                out.push(c);
            }
            escaped = false;
        }
    }
    Ok(out)
}

/// 为正则元字符加上反斜杠前缀。
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '[' | '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// 把值包在双引号里，并转义内部的双引号和反斜杠。
/// 与行文件和模式头中的带引号词法单元互为逆操作。
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// 数字字面量的宽判定：以数字开头即算，
/// 这样未加引号的日期、时间写法也归入字面量而不是列名。
pub fn looks_numeric(token: &str) -> bool {
    let rest = token.strip_prefix(['+', '-']).unwrap_or(token);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

/// 从一行中读出全部带引号的词法单元。
/// 以双引号开头的单元延伸到配对的未转义双引号，转义序列被解码；
/// 其余单元到下一个空白为止，原样保留。
pub fn split_quoted_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else { break };
        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                if escaped {
                    token.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    break;
                } else {
                    token.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split("a,b,c", ',', false), vec!["a", "b", "c"]);
        assert_eq!(split("", ',', false), vec![""]);
        assert_eq!(split("a,", ',', false), vec!["a", ""]);
    }

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(
            split("name = \"a b\" and x", ' ', true),
            vec!["name", "=", "\"a b\"", "and", "x"]
        );
        // 单引号内的逗号不切分
        assert_eq!(split("'a,b',c", ',', true), vec!["'a,b'", "c"]);
    }

    #[test]
    fn test_split_escaped_quote() {
        // 转义引号不会关闭字符串
        assert_eq!(split(r#""a\" b" c"#, ' ', true), vec![r#""a\" b""#, "c"]);
    }

    #[test]
    fn test_split_on_quote_char() {
        // 以引号为分隔符时按未转义引号切分，用于引号配对校验
        assert_eq!(split(r#"a"b"c"#, '"', true).len(), 3);
        assert_eq!(split(r#"a"b"#, '"', true).len(), 2);
    }

    #[test]
    fn test_extract_quoted() {
        assert_eq!(extract_quoted("\"abc\""), "abc");
        assert_eq!(extract_quoted("'abc'"), "abc");
        assert_eq!(extract_quoted("abc"), "abc");
        assert_eq!(extract_quoted("\"abc'"), "\"abc'");
        // 内部未转义引号使字符串不再是合法引用
        assert_eq!(extract_quoted("\"a\"b\""), "\"a\"b\"");
        assert_eq!(extract_quoted("\"a\\\"b\""), "a\\\"b");
        assert_eq!(extract_quoted(""), "");
        assert_eq!(extract_quoted("\""), "\"");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\"b"#).unwrap(), "a\"b");
        assert_eq!(unescape(r"a\\b").unwrap(), "a\\b");
        assert_eq!(unescape(r"a\'b").unwrap(), "a'b");
        assert_eq!(unescape("plain").unwrap(), "plain");
        assert!(matches!(unescape(r"a\nb"), Err(DbError::BadEscape('n'))));
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("a.b"), "a\\.b");
        assert_eq!(escape_regex("(x)*"), "\\(x\\)\\*");
        assert_eq!(escape_regex("plain"), "plain");
    }

    #[test]
    fn test_quote_roundtrip() {
        let original = r#"a"b\c"#;
        let quoted = quote(original);
        let tokens = split_quoted_tokens(&quoted);
        assert_eq!(tokens, vec![original.to_string()]);
    }

    #[test]
    fn test_split_quoted_tokens() {
        assert_eq!(
            split_quoted_tokens(r#""1" "Ada" plain"#),
            vec!["1", "Ada", "plain"]
        );
        assert_eq!(split_quoted_tokens(""), Vec::<String>::new());
        assert_eq!(
            split_quoted_tokens(r#""with space" "q\"uote""#),
            vec!["with space", "q\"uote"]
        );
    }
}
