//! Message templates and personalization.

use std::{fs, path::Path};

use crate::{domain::Recipient, Result};

/// Load a JSON array of template strings.
pub fn load_templates(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Render `template` for one recipient.
///
/// Supported placeholders: `{first_name}`, `{last_name}`, `{username}`,
/// `{id}`. A placeholder whose attribute is absent renders empty; unknown
/// placeholders are left verbatim so a typo degrades to visible text
/// instead of a failed delivery.
pub fn render(template: &str, recipient: &Recipient) -> String {
    template
        .replace("{first_name}", recipient.first_name.as_deref().unwrap_or(""))
        .replace("{last_name}", recipient.last_name.as_deref().unwrap_or(""))
        .replace("{username}", recipient.username.as_deref().unwrap_or(""))
        .replace("{id}", &recipient.id.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{Recipient, UserId};

    fn recipient() -> Recipient {
        Recipient {
            id: UserId(42),
            username: Some("jdoe".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: None,
            bot: false,
            verified: false,
            last_seen: None,
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let out = render("Hi {first_name} (@{username})!", &recipient());
        assert_eq!(out, "Hi Jane (@jdoe)!");
    }

    #[test]
    fn absent_attributes_render_empty() {
        let out = render("{first_name} {last_name}", &recipient());
        assert_eq!(out, "Jane ");
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let out = render("Hi {first_name}, your {plan} expires", &recipient());
        assert_eq!(out, "Hi Jane, your {plan} expires");
    }

    #[test]
    fn templates_load_from_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        fs::write(&path, r#"["Hi {first_name}!", "Hello {username}"]"#).unwrap();

        let templates = load_templates(&path).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0], "Hi {first_name}!");
    }

    #[test]
    fn malformed_template_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_templates(&path).is_err());
    }
}
