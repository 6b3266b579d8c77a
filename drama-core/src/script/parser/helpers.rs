//! # 辅助解析函数
//!
//! 手写的字符串解析辅助函数，无正则依赖。

/// 检查字符串是否以指定前缀开头（ASCII 大小写不敏感）
pub fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()]
            .iter()
            .zip(prefix.as_bytes())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// 在 `haystack` 中查找 `needle`（ASCII 大小写不敏感），返回字节位置
pub fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from > hay.len() || hay.len() - from < needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len())
        .find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// 拆分标签内部文本，返回 `(是否闭合标签, 标签名, 剩余属性文本)`
///
/// 输入为 `<` 与 `>` 之间的内容：
/// - `sound name="rain"` → `(false, "sound", "name=\"rain\"")`
/// - `/parallel` → `(true, "parallel", "")`
pub fn split_tag(inner: &str) -> (bool, &str, &str) {
    let inner = inner.trim();
    let (closing, body) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, inner),
    };
    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(body.len());
    (closing, &body[..name_end], body[name_end..].trim())
}

/// 标签是否自闭合（`<sound ... />`）
pub fn is_self_closing(inner: &str) -> bool {
    inner.trim_end().ends_with('/')
}

/// 从标签文本中提取属性值
///
/// 输入: `sound loop="true" volume="0.2" name="rain"`, `"name"`
/// 输出: `Some("rain")`
///
/// 属性名大小写不敏感，必须独立成词；值必须被单引号或双引号包围。
pub fn extract_attr<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let mut from = 0;
    while let Some(pos) = find_ignore_case(tag, key, from) {
        from = pos + key.len();

        // 属性名前必须是开头或空白
        let boundary_before = tag[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace());
        if !boundary_before {
            continue;
        }

        let after_key = tag[pos + key.len()..].trim_start();
        let Some(after_eq) = after_key.strip_prefix('=') else {
            continue;
        };
        let after_eq = after_eq.trim_start();

        let quote_char = after_eq.chars().next()?;
        if quote_char != '"' && quote_char != '\'' {
            return None;
        }

        let after_quote = &after_eq[1..];
        let end_quote = after_quote.find(quote_char)?;
        return Some(&after_quote[..end_quote]);
    }
    None
}

/// 标签中是否出现独立的标记词（如 `loop`）
pub fn has_flag(tag: &str, flag: &str) -> bool {
    tag.split(|c: char| c.is_whitespace() || c == '/')
        .any(|word| word.eq_ignore_ascii_case(flag))
}

/// 解析循环标记
///
/// - `loop="true"` / `loop="false"`：按取值
/// - 单独的 `loop`：视为 true
pub fn parse_loop_flag(tag: &str) -> bool {
    match extract_attr(tag, "loop") {
        Some(value) => value.trim().eq_ignore_ascii_case("true"),
        None => has_flag(tag, "loop"),
    }
}

/// 解析停顿时长
///
/// 输入为 `<` 与 `>` 之间的内容（如 `#0.5#`）。去掉所有 `#` 后取开头最长的数字前缀，
/// 因此 `#2s#` 得到 2，`#1.5 seconds#` 得到 1.5；没有数字前缀时返回 NaN。
pub fn parse_pause_duration(inner: &str) -> f64 {
    let digits: String = inner.chars().filter(|&c| c != '#').collect();
    let text = digits.trim_start();
    text[..float_prefix_len(text)]
        .parse::<f64>()
        .unwrap_or(f64::NAN)
}

/// 开头最长的十进制浮点数前缀的字节长度（可带符号与指数），没有时为 0
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign);
    let mut mantissa = end - sign;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_from = end + 1 + exp_sign;
        let exp_end = digits_from(exp_from);
        if exp_end > exp_from {
            end = exp_end;
        }
    }
    end
}
