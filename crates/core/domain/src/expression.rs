//! 触发器表达式中的主机引用。
//!
//! 表达式以 `{host:key.func(params)}` 引用监控项；`{$MACRO}`、`{#LLD}`
//! 与 `{TRIGGER.VALUE}` 之类不含主机部分的记号原样保留。

use std::collections::HashSet;

enum Segment<'a> {
    Text(&'a str),
    Function { host: &'a str, rest: &'a str },
}

fn segments(expression: &str) -> Vec<Segment<'_>> {
    let bytes = expression.as_bytes();
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != b'{' {
            index += 1;
            continue;
        }
        let Some(end) = matching_brace(bytes, index) else {
            break;
        };
        let token = &expression[index + 1..end];
        let is_macro = token.starts_with('$') || token.starts_with('#');
        match token.find(':') {
            Some(colon) if !is_macro && colon > 0 => {
                if text_start < index {
                    out.push(Segment::Text(&expression[text_start..index]));
                }
                out.push(Segment::Function {
                    host: &token[..colon],
                    rest: &token[colon + 1..],
                });
                text_start = end + 1;
            }
            _ => {}
        }
        index = end + 1;
    }
    if text_start < expression.len() {
        out.push(Segment::Text(&expression[text_start..]));
    }
    out
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in bytes[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// 表达式引用的主机名（去重，保持出现顺序）。
pub fn referenced_hosts(expression: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    segments(expression)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Function { host, .. } if seen.insert(host) => Some(host.to_string()),
            _ => None,
        })
        .collect()
}

/// 将属于 `from` 的主机名改写为 `to`。
pub fn replace_hosts(expression: &str, from: &HashSet<&str>, to: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    for segment in segments(expression) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Function { host, rest } => {
                out.push('{');
                out.push_str(if from.contains(host) { to } else { host });
                out.push(':');
                out.push_str(rest);
                out.push('}');
            }
        }
    }
    out
}
