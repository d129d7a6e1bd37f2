/// Generate a commit message for a squash from the messages being replaced.
///
/// `messages` are newest first. A `Final:` commit wins outright; when most
/// commits are WIP the best non-WIP message (or the feature named in a
/// `WIP:` prefix) is used; otherwise the newest message is kept.
pub fn generate_squash_message(messages: &[String]) -> String {
    let messages: Vec<&str> = messages
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();

    let Some(newest) = messages.first() else {
        return "Squashed commits".to_string();
    };

    if let Some(rest) = newest
        .strip_prefix("Final:")
        .or_else(|| newest.strip_prefix("final:"))
    {
        let rest = rest.trim();
        if !rest.is_empty() {
            return rest.to_string();
        }
    }

    let wip_count = messages.iter().filter(|m| is_wip(m)).count();
    if wip_count > messages.len() / 2 {
        if let Some(best) = messages.iter().find(|m| !is_wip(m)) {
            return best.to_string();
        }
        return extract_feature_from_wip(&messages);
    }

    newest.to_string()
}

fn is_wip(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.starts_with("wip") || lower.contains("work in progress")
}

/// Extract feature name from WIP commit messages
fn extract_feature_from_wip(messages: &[&str]) -> String {
    // "WIP: add authentication" -> "Add authentication"
    for msg in messages {
        if let Some(rest) = msg.strip_prefix("WIP:").or_else(|| msg.strip_prefix("wip:")) {
            let feature = rest.trim();
            if feature.len() > 3 {
                let mut chars = feature.chars();
                if let Some(first) = chars.next() {
                    return first.to_uppercase().chain(chars).collect();
                }
            }
        }
    }

    if let Some(first) = messages.first() {
        let cleaned = first
            .trim_start_matches("WIP:")
            .trim_start_matches("wip:")
            .trim_start_matches("WIP")
            .trim_start_matches("wip")
            .trim();

        if !cleaned.is_empty() {
            return format!("Implement {cleaned}");
        }
    }

    format!("Squashed {} commits", messages.len())
}
