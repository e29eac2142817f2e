use crate::manifest::ManifestEntry;

const MIN_FENCE_LEN: usize = 3;

/// Builds the user message sent alongside the upgrade policy prompt.
///
/// Free text (file content and summary) sits between quote fences that are
/// always longer than any run of `"` inside that text, so the embedded data can
/// never close its own block. Path and next steps are JSON string literals.
pub fn build_payload(entry: &ManifestEntry, file_content: &str) -> String {
    let mut payload = String::new();
    payload.push_str(&format!("file {} {{\n", json_quote(&entry.file_path)));
    push_fenced_field(&mut payload, "content", file_content);

    if !entry.summary.trim().is_empty() {
        push_fenced_field(&mut payload, "summary", &entry.summary);
    }
    if !entry.next_steps.is_empty() {
        let steps = entry
            .next_steps
            .iter()
            .map(|step| json_quote(step))
            .collect::<Vec<_>>()
            .join(", ");
        payload.push_str(&format!("    next_steps: [{steps}]\n"));
    }
    if let Some(updated_at) = entry.updated_at {
        payload.push_str(&format!(
            "    updated_at: {}\n",
            json_quote(&updated_at.to_rfc3339())
        ));
    }

    payload.push_str("}\n");
    payload
}

/// Quote fence for `text`: at least three `"`, one longer than its longest run.
pub fn fence_for(text: &str) -> String {
    let mut longest = 0_usize;
    let mut current = 0_usize;
    for ch in text.chars() {
        if ch == '"' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "\"".repeat((longest + 1).max(MIN_FENCE_LEN))
}

fn push_fenced_field(payload: &mut String, name: &str, text: &str) {
    let fence = fence_for(text);
    payload.push_str(&format!("    {name}: {fence}\n"));
    payload.push_str(text);
    if !text.ends_with('\n') {
        payload.push('\n');
    }
    payload.push_str(&format!("    {fence}\n"));
}

fn json_quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
