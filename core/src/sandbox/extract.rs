use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```(?:python|py)[ \t]*\r?\n(.*?)^[ \t]*```[ \t]*$").ok()
});

pub fn extract(text: &str) -> (String, bool) {
    let Some(fence) = CODE_FENCE.as_ref() else {
        return (String::new(), false);
    };
    let blocks: Vec<String> = fence
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| dedent(body.as_str().trim_matches('\n')).trim_end().to_string())
        .collect();

    if blocks.is_empty() {
        return (String::new(), false);
    }
    (blocks.join("\n\n"), true)
}

fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
