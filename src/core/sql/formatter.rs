/// 查询文本规整：在词法层面为解析器铺平道路。
/// 引号外的连续空格压成一个；( , ) ; = 前后补上单个空格
/// （分号后面不补）；被拆开的 <= >= != 再拼回去。
/// 反斜杠每出现一次翻转一次转义标志，引号内的内容原样保留。
pub fn format_query(query: &str) -> String {
    const SEPARATE: [char; 5] = ['(', ',', ')', ';', '='];
    let mut out = String::with_capacity(query.len() + 16);
    let mut escaped = false;
    let mut quoted = false;
    let mut quote_char = '\0';
    let mut whitespace_found = false;
    for c in query.chars() {
        if c == '\\' {
            escaped = !escaped;
            out.push(c);
        } else {
            if c == ' ' && whitespace_found && !quoted {
                continue;
            }
            if (c == '"' || c == '\'') && !escaped {
                if quote_char == '\0' || quote_char == c {
                    quoted = !quoted;
                    quote_char = if quote_char == '\0' { c } else { '\0' };
                }
            }
            escaped = false;
            if !quoted && SEPARATE.contains(&c) {
                if !whitespace_found {
                    out.push(' ');
                }
                out.push(c);
                if c != ';' {
                    out.push(' ');
                }
            } else {
                out.push(c);
            }
        }
        whitespace_found = out.ends_with(' ');
    }
    out.replace("< =", "<=").replace("> =", ">=").replace("! =", "!=")
}
