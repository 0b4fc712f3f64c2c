// File: forms.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::probe::{FormInput, FormMethod, InjectionPoint};
use crate::target::Target;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

static FORM: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<form\b([^>]*)>(.*?)</form\s*>")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .unwrap()
});

static FIELD: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<(input|textarea|select)\b([^>]*)>")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap()
});

/// Input types that carry no free-form value worth injecting into.
const FIXED_TYPES: &[&str] = &[
    "submit", "button", "image", "reset", "file", "checkbox", "radio",
];

/// Value sent for fields the page leaves empty.
const FILLER: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlForm {
    pub action: Url,
    pub method: FormMethod,
    /// Every named field, in document order, with the value it is submitted with.
    pub fields: Vec<(String, String)>,
    /// Names of the fields that take free-form text.
    pub injectable: Vec<String>,
}

fn attribute(attributes: &str, wanted: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attributes).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(wanted) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
    })
}

/// Every `<form>` on `page`, with its action resolved against the page URL.
pub fn extract_forms(html: &str, page: &Url) -> Vec<HtmlForm> {
    let mut forms = Vec::new();
    for caps in FORM.captures_iter(html) {
        let attributes = &caps[1];
        let inner = &caps[2];

        let action = match attribute(attributes, "action").filter(|a| !a.trim().is_empty()) {
            Some(action) => match page.join(action.trim()) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Ignoring form with unusable action '{}': {}", action, e);
                    continue;
                }
            },
            None => page.clone(),
        };
        let method = match attribute(attributes, "method") {
            Some(method) if method.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };

        let mut fields = Vec::new();
        let mut injectable = Vec::new();
        for field in FIELD.captures_iter(inner) {
            let tag = field[1].to_ascii_lowercase();
            let attrs = &field[2];
            let Some(name) = attribute(attrs, "name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if fields.iter().any(|(existing, _)| *existing == name) {
                continue;
            }
            let kind = attribute(attrs, "type")
                .unwrap_or_else(|| "text".to_string())
                .to_ascii_lowercase();
            let value = attribute(attrs, "value")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| FILLER.to_string());

            if tag != "input" || !FIXED_TYPES.contains(&kind.as_str()) {
                injectable.push(name.clone());
            }
            fields.push((name, value));
        }

        forms.push(HtmlForm {
            action,
            method,
            fields,
            injectable,
        });
    }
    forms
}

impl HtmlForm {
    /// `(path, point)` pairs for each injectable field, or nothing when the
    /// form submits outside the target's scope.
    pub fn injection_targets(&self, target: &Target) -> Vec<(String, InjectionPoint)> {
        let mut action = self.action.clone();
        action.set_fragment(None);
        if self.method == FormMethod::Get {
            action.set_query(None);
        }
        let Some(path) = target.relative_path(&action) else {
            debug!("Form action {} is outside the target scope", self.action);
            return Vec::new();
        };

        self.injectable
            .iter()
            .map(|name| {
                let point = InjectionPoint::PageForm(FormInput {
                    method: self.method,
                    name: name.clone(),
                    fields: self.fields.clone(),
                });
                (path.clone(), point)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
<form action="/search" method="get">
  <input type="text" name="q">
  <input type="hidden" name="lang" value="en">
  <input type="submit" name="go" value="Search">
</form>
<FORM METHOD='POST'>
  <input name='user' value=''>
  <textarea name="comment"></textarea>
  <select name="rating"><option>1</option></select>
  <input type="checkbox" name="remember" value="yes">
  <input type="text" value="no name">
</FORM>
<form action="https://elsewhere.example/collect" method="post"><input name="email"></form>
</body></html>"#;

    fn page() -> Url {
        Url::parse("http://example.com/shop/contact?ref=home").unwrap()
    }

    #[test]
    fn test_extracts_action_method_and_fields() {
        let forms = extract_forms(PAGE, &page());
        assert_eq!(forms.len(), 3);

        let search = &forms[0];
        assert_eq!(search.action.as_str(), "http://example.com/search");
        assert_eq!(search.method, FormMethod::Get);
        assert_eq!(
            search.fields,
            vec![
                ("q".to_string(), "test".to_string()),
                ("lang".to_string(), "en".to_string()),
                ("go".to_string(), "Search".to_string()),
            ]
        );
        assert_eq!(search.injectable, vec!["q", "lang"]);

        let contact = &forms[1];
        assert_eq!(contact.action, page());
        assert_eq!(contact.method, FormMethod::Post);
        assert_eq!(contact.injectable, vec!["user", "comment", "rating"]);
        assert!(contact
            .fields
            .contains(&("remember".to_string(), "yes".to_string())));
    }

    #[test]
    fn test_injection_targets_stay_in_scope() {
        let target = Target::parse("http://example.com/shop").unwrap();
        let forms = extract_forms(PAGE, &page());

        // Posts back to the page itself, keeping its query string.
        let contact = forms[1].injection_targets(&target);
        assert_eq!(contact.len(), 3);
        assert_eq!(contact[0].0, "contact?ref=home");
        assert_eq!(contact[0].1.name(), "user");

        // Outside the /shop base path and on another origin.
        assert!(forms[0].injection_targets(&target).is_empty());
        assert!(forms[2].injection_targets(&target).is_empty());
    }

    #[test]
    fn test_get_form_drops_action_query() {
        let html = r#"<form action="find?old=1"><input name="q"></form>"#;
        let target = Target::parse("http://example.com").unwrap();
        let forms = extract_forms(html, &Url::parse("http://example.com/").unwrap());
        let targets = forms[0].injection_targets(&target);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, "find");
    }

    #[test]
    fn test_page_without_forms() {
        assert!(extract_forms("<html><input name=q></html>", &page()).is_empty());
    }
}
