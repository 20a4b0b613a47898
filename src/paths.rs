// Learning paths and the role tags that place a course on one.

pub const DEFAULT_PATH_SLUG: &str = "fullstack";

pub fn path_for_role(tag: &str) -> Option<&'static str> {
    match tag.trim().to_ascii_lowercase().as_str() {
        "full stack web development" | "full stack" | "web development" => Some("fullstack"),
        "data science" | "data science & ai" | "data analytics" => Some("data-science"),
        "mobile app development" | "mobile development" => Some("mobile"),
        "ui/ux design" | "ui/ux" | "product design" => Some("uiux"),
        "cloud & devops" | "devops" | "cloud engineering" => Some("devops"),
        "cybersecurity" | "cyber security" => Some("cybersecurity"),
        _ => None,
    }
}

/// First recognised tag wins; untagged or unknown courses land on the baseline path.
pub fn infer_path_slug<S: AsRef<str>>(roles: &[S]) -> &'static str {
    roles
        .iter()
        .find_map(|r| path_for_role(r.as_ref()))
        .unwrap_or(DEFAULT_PATH_SLUG)
}
