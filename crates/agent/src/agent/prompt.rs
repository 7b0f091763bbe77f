pub const DEFAULT_USER_NAME: &str = "User";

/// System message placed before the history on every model call.
pub fn system_prompt(user_name: Option<&str>) -> String {
    let name = user_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_USER_NAME);
    format!(
        "You are a helpful assistant that can use tools to answer questions.\n\
         Greet the user by their name if provided. The user's name is: {}",
        name
    )
}
