//! Shared sample documents and helpers for integration tests.

/// GPT-format report: `[[n]](URL)` inline markers, reference block after a
/// `---` separator.
pub const GPT_REPORT: &str = "\
# Findings

See result[[1]](http://example.com/a) and also[[2]](http://example.com/b)

---
1. Alpha Report http://example.com/a
2. Beta Report http://example.com/b
";

/// Gemini-format report: ` n。` inline markers, numbered reference list
/// with the access-time locale artifact.
pub const GEMINI_REPORT: &str = "\
# 调查结果

研究表明该方法有效 1。另一项工作 2，也证实了这一点。

1. 第一篇报告, 访问时间为 2024年1月1日， [https://a.cn/1](https://a.cn/1)
2. 第二篇报告, 访问时间为 2024年2月2日， [https://b.cn/2](https://b.cn/2)
";

/// A document already in canonical footnote format.
pub const CONVERTED_REPORT: &str = "\
# Findings

See result[^1] and also[^2]

[^1]: Alpha Report http://example.com/a
[^2]: Beta Report http://example.com/b
";

/// Prose with no citation markers at all.
pub const PLAIN_DOCUMENT: &str = "Just prose. Version 42. Nothing cited.\n";

/// Builds a GPT-format document citing the given numbers, with a matching
/// reference block.
pub fn gpt_report_with_numbers(numbers: &[u32]) -> String {
    let mut body = String::from("# Report\n\n");
    for n in numbers {
        body.push_str(&format!("Claim {n} is cited[[{n}]](http://example.com/{n}). "));
    }
    body.push_str("\n\n---\n");
    for n in numbers {
        body.push_str(&format!("{n}. Source {n} http://example.com/{n}\n"));
    }
    body
}
